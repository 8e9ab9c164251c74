use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use wheelhouse::broker::auth::{OAuthTokenManager, StaticTokenProvider};
use wheelhouse::broker::client::BrokerClient;
use wheelhouse::config::{AnalyzerConfig, BrokerConfig};
use wheelhouse::errors::{WheelError, WheelResult};
use wheelhouse::market::types::{OptionType, OptionsChain};
use wheelhouse::market::MarketDataSource;
use wheelhouse::models::strike_optimizer::StrikeOptimizer;
use wheelhouse::models::volatility::{self, VolatilityEstimate};
use wheelhouse::models::StrikeProfile;
use wheelhouse::risk::analyzer::{PositionInputs, RiskAnalyzer, DEFAULT_EXPECTED_VOLATILITY};
use wheelhouse::strategies::covered_call::CoveredCallAnalyzer;
use wheelhouse::strategies::covered_put::CoveredPutAnalyzer;
use wheelhouse::strategies::wheel::{WheelState, WheelStrategy};
use wheelhouse::strategies::RecommendationRequest;

#[derive(Parser)]
#[command(name = "wheelhouse")]
#[command(about = "Covered call, cash-secured put and wheel analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Next option to sell for the current wheel state
    Recommend {
        #[command(flatten)]
        market: MarketArgs,

        /// cash or shares
        #[arg(long)]
        state: WheelState,
    },

    /// Ranked covered calls
    Calls {
        #[command(flatten)]
        market: MarketArgs,

        #[arg(long, default_value_t = 5)]
        limit: usize,

        /// YYYY-MM-DD; nearest expiration when omitted
        #[arg(long)]
        expiration: Option<NaiveDate>,
    },

    /// Ranked cash-secured puts
    Puts {
        #[command(flatten)]
        market: MarketArgs,

        #[arg(long, default_value_t = 5)]
        limit: usize,

        #[arg(long)]
        expiration: Option<NaiveDate>,
    },

    /// Income, risk and scenario analysis for one position (offline)
    Analyze {
        /// call or put
        #[arg(long)]
        side: OptionType,

        #[arg(long)]
        current: f64,

        #[arg(long)]
        strike: f64,

        #[arg(long)]
        premium: f64,

        #[arg(long)]
        dte: i64,

        /// Derived from --volatility when omitted
        #[arg(long)]
        probability_itm: Option<f64>,

        #[arg(long)]
        cost_basis: Option<f64>,

        #[arg(long)]
        price_target: Option<f64>,

        #[arg(long, default_value_t = DEFAULT_EXPECTED_VOLATILITY)]
        volatility: f64,

        #[arg(long, default_value_t = 100)]
        shares: u32,

        #[arg(long)]
        no_scenarios: bool,
    },

    /// Covered call vs cash-secured put by expected value (offline)
    Compare {
        #[arg(long)]
        current: f64,

        #[arg(long)]
        call_strike: f64,

        #[arg(long)]
        call_premium: f64,

        #[arg(long)]
        put_strike: f64,

        #[arg(long)]
        put_premium: f64,

        #[arg(long)]
        dte: i64,

        #[arg(long)]
        call_probability_itm: Option<f64>,

        #[arg(long)]
        put_probability_itm: Option<f64>,

        #[arg(long, default_value_t = DEFAULT_EXPECTED_VOLATILITY)]
        volatility: f64,

        #[arg(long, default_value_t = 100)]
        shares: u32,
    },

    /// Premium and P&L summary for one wheel cycle (offline)
    Cycle {
        /// Repeat once per premium collected, in dollars
        #[arg(long = "premium")]
        premiums: Vec<f64>,

        #[arg(long)]
        acquisition: Option<f64>,

        #[arg(long)]
        sale: Option<f64>,

        #[arg(long, default_value_t = 0)]
        puts: u32,

        #[arg(long, default_value_t = 0)]
        calls: u32,
    },

    /// Print the OAuth authorization URL
    AuthUrl,

    /// Exchange the code from the OAuth redirect for tokens
    ExchangeCode {
        #[arg(long)]
        code: String,
    },
}

#[derive(Args)]
struct MarketArgs {
    #[arg(long)]
    symbol: String,

    /// Annualized decimal; estimated from daily closes when omitted
    #[arg(long)]
    volatility: Option<f64>,

    #[arg(long)]
    profile: Option<StrikeProfile>,

    #[arg(long, default_value_t = 100)]
    shares: u32,

    #[arg(long)]
    cost_basis: Option<f64>,

    #[arg(long, default_value_t = 0.05)]
    min_premium: f64,

    /// YYYY-MM-DD, repeatable
    #[arg(long = "earnings")]
    earnings: Vec<NaiveDate>,

    /// YYYY-MM-DD, repeatable
    #[arg(long = "ex-dividend")]
    ex_dividend: Vec<NaiveDate>,
}

impl MarketArgs {
    fn request(&self, limit: usize, expiration: Option<NaiveDate>) -> RecommendationRequest {
        RecommendationRequest {
            shares: self.shares,
            cost_basis: self.cost_basis,
            expiration,
            profile: self.profile,
            min_premium: self.min_premium,
            limit,
            earnings_dates: self.earnings.clone(),
            ex_dividend_dates: self.ex_dividend.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> WheelResult<()> {
    let analyzer_config = AnalyzerConfig::from_env()?;

    match command {
        Commands::Analyze {
            side,
            current,
            strike,
            premium,
            dte,
            probability_itm,
            cost_basis,
            price_target,
            volatility,
            shares,
            no_scenarios,
        } => {
            let p_itm = match probability_itm {
                Some(p) => p,
                None => implied_probability(strike, current, volatility, dte, side)?,
            };
            let inputs = PositionInputs::new(current, strike, premium, dte, p_itm)
                .with_shares(shares)
                .with_cost_basis(cost_basis)
                .with_price_target(price_target)
                .with_expected_volatility(volatility);
            let analyzer = RiskAnalyzer::new(analyzer_config.risk_free_rate);
            let analysis = match side {
                OptionType::Call => analyzer.analyze_covered_call(&inputs, !no_scenarios),
                OptionType::Put => analyzer.analyze_cash_secured_put(&inputs, !no_scenarios),
            };
            print_json(&analysis)
        }

        Commands::Compare {
            current,
            call_strike,
            call_premium,
            put_strike,
            put_premium,
            dte,
            call_probability_itm,
            put_probability_itm,
            volatility,
            shares,
        } => {
            let call_p = match call_probability_itm {
                Some(p) => p,
                None => implied_probability(call_strike, current, volatility, dte, OptionType::Call)?,
            };
            let put_p = match put_probability_itm {
                Some(p) => p,
                None => implied_probability(put_strike, current, volatility, dte, OptionType::Put)?,
            };
            let call = PositionInputs::new(current, call_strike, call_premium, dte, call_p)
                .with_shares(shares)
                .with_expected_volatility(volatility);
            let put = PositionInputs::new(current, put_strike, put_premium, dte, put_p)
                .with_shares(shares)
                .with_expected_volatility(volatility);
            let comparison = RiskAnalyzer::new(analyzer_config.risk_free_rate).compare_strategies(&call, &put);
            print_json(&comparison)
        }

        Commands::Cycle {
            premiums,
            acquisition,
            sale,
            puts,
            calls,
        } => print_json(&WheelStrategy::calculate_cycle_metrics(
            &premiums,
            acquisition,
            sale,
            puts,
            calls,
        )),

        Commands::AuthUrl => {
            let manager = OAuthTokenManager::new(BrokerConfig::from_env()?)?;
            println!("{}", manager.authorization_url()?);
            Ok(())
        }

        Commands::ExchangeCode { code } => {
            let manager = OAuthTokenManager::new(BrokerConfig::from_env()?)?;
            let tokens = manager.exchange_code(&code).await?;
            tracing::info!(expires_at = %tokens.expires_at, "tokens stored");
            Ok(())
        }

        market_command => {
            let broker_config = BrokerConfig::from_env()?;
            match std::env::var("BROKER_ACCESS_TOKEN") {
                Ok(token) if !token.is_empty() => {
                    let client = BrokerClient::new(&broker_config, StaticTokenProvider::new(token))?;
                    run_market(&client, &analyzer_config, market_command).await
                }
                _ => {
                    let tokens = OAuthTokenManager::new(broker_config.clone())?;
                    let client = BrokerClient::new(&broker_config, tokens)?;
                    run_market(&client, &analyzer_config, market_command).await
                }
            }
        }
    }
}

async fn run_market<S: MarketDataSource>(
    source: &S,
    config: &AnalyzerConfig,
    command: Commands,
) -> WheelResult<()> {
    match command {
        Commands::Recommend { market, state } => {
            let snapshot = fetch_snapshot(source, &market).await?;
            let recommendation = WheelStrategy::new(config).get_recommendation(
                state,
                &snapshot.chain,
                snapshot.current_price,
                snapshot.volatility,
                &market.request(1, None),
            )?;
            print_json(&serde_json::json!({
                "symbol": snapshot.chain.symbol,
                "current_price": snapshot.current_price,
                "volatility": snapshot.volatility,
                "volatility_estimate": snapshot.estimate,
                "recommendation": recommendation,
            }))
        }

        Commands::Calls {
            market,
            limit,
            expiration,
        } => {
            let snapshot = fetch_snapshot(source, &market).await?;
            let results = CoveredCallAnalyzer::new(config).get_recommendations(
                &snapshot.chain,
                snapshot.current_price,
                snapshot.volatility,
                &market.request(limit, expiration),
            )?;
            print_json(&serde_json::json!({
                "symbol": snapshot.chain.symbol,
                "current_price": snapshot.current_price,
                "volatility": snapshot.volatility,
                "volatility_estimate": snapshot.estimate,
                "recommendations": results,
            }))
        }

        Commands::Puts {
            market,
            limit,
            expiration,
        } => {
            let snapshot = fetch_snapshot(source, &market).await?;
            let results = CoveredPutAnalyzer::new(config).get_recommendations(
                &snapshot.chain,
                snapshot.current_price,
                snapshot.volatility,
                &market.request(limit, expiration),
            )?;
            print_json(&serde_json::json!({
                "symbol": snapshot.chain.symbol,
                "current_price": snapshot.current_price,
                "volatility": snapshot.volatility,
                "volatility_estimate": snapshot.estimate,
                "recommendations": results,
            }))
        }

        _ => Err(WheelError::Validation("not a market data command".into())),
    }
}

struct MarketSnapshot {
    chain: OptionsChain,
    current_price: f64,
    volatility: f64,
    /// Historical and EWMA estimates; None when the volatility was given
    estimate: Option<VolatilityEstimate>,
}

async fn fetch_snapshot<S: MarketDataSource>(source: &S, market: &MarketArgs) -> WheelResult<MarketSnapshot> {
    let (chain, quote) = tokio::try_join!(
        source.get_option_chain(&market.symbol),
        source.get_quote(&market.symbol),
    )?;

    let (volatility, estimate) = match market.volatility {
        Some(v) => (v, None),
        None => {
            let series = source.get_price_history(&market.symbol).await?;
            let estimate = volatility::estimate(&series, volatility::DEFAULT_WINDOW).ok_or_else(|| {
                WheelError::Validation(format!(
                    "not enough price history to estimate volatility for {}",
                    market.symbol
                ))
            })?;
            (estimate.historical, Some(estimate))
        }
    };

    let current_price = quote.price();
    tracing::info!(
        symbol = %chain.symbol,
        price = current_price,
        volatility = volatility,
        ewma = ?estimate.as_ref().map(|e| e.ewma),
        "market snapshot"
    );

    Ok(MarketSnapshot {
        chain,
        current_price,
        volatility,
        estimate,
    })
}

fn implied_probability(
    strike: f64,
    current: f64,
    volatility: f64,
    dte: i64,
    side: OptionType,
) -> WheelResult<f64> {
    StrikeOptimizer::new()
        .calculate_assignment_probability(strike, current, volatility, dte.max(1), side)
        .map(|r| r.probability)
}

fn print_json<T: Serialize>(value: &T) -> WheelResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
