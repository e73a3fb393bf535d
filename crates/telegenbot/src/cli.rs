use clap::{Parser, Subcommand};
use telegencore::fixtures::TestDataOptions;
use telegencore::models::TariffCode;

#[derive(Parser)]
#[command(name = "telegen")]
#[command(author, version, about = "Telegram bot that generates and publishes channel posts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot, the scheduler and the payment webhook server
    Run {
        /// Port of the webhook server (defaults to WEB_PORT)
        #[arg(long)]
        webhook_port: Option<u16>,
    },

    /// Create or update the free, basic and pro tariffs
    SeedTariffs {
        /// Delete all tariffs first (cascades to periods and subscriptions)
        #[arg(long)]
        clear: bool,
    },

    /// Fill the database with generated users, channels and flows
    GenerateTestData {
        #[arg(long, default_value_t = 5)]
        users: usize,

        #[arg(long, default_value_t = 1)]
        min_channels: usize,

        #[arg(long, default_value_t = 3)]
        max_channels: usize,

        #[arg(long, default_value_t = 1)]
        min_flows: usize,

        #[arg(long, default_value_t = 2)]
        max_flows: usize,

        #[arg(long, default_value_t = 2)]
        min_sources: usize,

        #[arg(long, default_value_t = 5)]
        max_sources: usize,

        /// Remove previously generated test users before generating
        #[arg(long)]
        cleanup: bool,
    },

    /// Delete generated test users and everything they own
    CleanupTestData {
        /// Delete every user, not only generated ones
        #[arg(long)]
        all_users: bool,
    },

    /// Add a promo code that grants a tariff period without payment
    CreatePromoCode {
        /// Code users type in; stored upper-case
        #[arg(long)]
        code: String,

        /// Tariff the code grants (free, basic, pro)
        #[arg(long)]
        tariff: TariffCode,

        /// Length of the granted period in months
        #[arg(long, default_value_t = 1)]
        months: i64,
    },

    /// Apply database migrations and exit
    Migrate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Commands {
    /// Test data options of a `generate-test-data` invocation
    pub fn test_data_options(&self) -> Option<TestDataOptions> {
        match *self {
            Commands::GenerateTestData {
                users,
                min_channels,
                max_channels,
                min_flows,
                max_flows,
                min_sources,
                max_sources,
                ..
            } => Some(TestDataOptions {
                users,
                min_channels,
                max_channels,
                min_flows,
                max_flows,
                min_sources,
                max_sources,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_test_data_defaults() {
        let cli = Cli::try_parse_from(["telegen", "generate-test-data"]).unwrap();
        let command = cli.command.unwrap();
        assert_eq!(command.test_data_options(), Some(TestDataOptions::default()));
    }

    #[test]
    fn test_run_with_port_and_flags() {
        let cli = Cli::try_parse_from(["telegen", "run", "--webhook-port", "9000"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run { webhook_port: Some(9000) })));

        let cli = Cli::try_parse_from(["telegen", "cleanup-test-data", "--all-users"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::CleanupTestData { all_users: true })));

        let cli = Cli::try_parse_from(["telegen"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_create_promo_code_args() {
        let cli = Cli::try_parse_from(["telegen", "create-promo-code", "--code", "spring", "--tariff", "pro", "--months", "6"])
            .unwrap();
        match cli.command {
            Some(Commands::CreatePromoCode { code, tariff, months }) => {
                assert_eq!(code, "spring");
                assert_eq!(tariff, TariffCode::Pro);
                assert_eq!(months, 6);
            }
            _ => panic!("expected create-promo-code"),
        }
        assert!(Cli::try_parse_from(["telegen", "create-promo-code", "--code", "x", "--tariff", "gold"]).is_err());
    }
}
