use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "promo-booking")]
#[command(about = "Promo-code redemption and spa slot booking")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "campaign.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate the configuration and print a summary
    Check,

    /// Import promo codes from a CSV file with a `code` column
    Seed {
        #[arg(short, long)]
        file: String,
    },

    /// Redeem a code; with --name and --contact the guest is registered in one step
    Redeem {
        #[arg(long)]
        code: String,

        #[arg(long, requires = "contact")]
        name: Option<String>,

        #[arg(long, requires = "name")]
        contact: Option<String>,
    },

    /// Complete a pending redemption with the guest's identity
    Register {
        #[arg(long)]
        code: String,

        /// Claim token returned by `redeem`
        #[arg(long)]
        token: String,

        #[arg(long)]
        name: String,

        /// E-mail address or Telegram chat id
        #[arg(long)]
        contact: String,
    },

    /// List bookable blocks for a guest
    Availability {
        #[arg(long)]
        guest: String,

        /// First date to list (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<String>,
    },

    /// Book a slot for a guest
    Book {
        #[arg(long)]
        guest: String,

        /// YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// HH:MM
        #[arg(long)]
        start: String,

        /// HH:MM
        #[arg(long)]
        end: String,

        #[arg(long)]
        service: Option<String>,
    },
}
