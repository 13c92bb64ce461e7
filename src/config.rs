//! CLI configuration module

use std::{num::NonZeroU32, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use trynex_cart::{
    checkout::{FLAT_DELIVERY_FEE, FREE_DELIVERY_THRESHOLD},
    prelude::{DEFAULT_STORAGE_KEY, DeliveryPolicy, LineItemId, PaymentMethod},
};

/// Trynex cart configuration
#[derive(Debug, Parser)]
#[command(name = "trynex-cart", about = "Trynex Lifestyle cart", long_about = None)]
pub struct CliConfig {
    /// Directory the cart is persisted in
    #[arg(long, env = "TRYNEX_STORAGE_DIR", default_value = ".trynex")]
    pub storage_dir: PathBuf,

    /// Storage key of the cart
    #[arg(long, env = "TRYNEX_CART_KEY", default_value = DEFAULT_STORAGE_KEY)]
    pub cart_key: String,

    #[command(flatten)]
    pub delivery: DeliveryConfig,

    #[command(flatten)]
    pub logging: LoggingConfig,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}

/// Delivery pricing settings.
#[derive(Debug, Args)]
pub struct DeliveryConfig {
    /// Subtotal from which delivery is free
    #[arg(long, env = "TRYNEX_FREE_DELIVERY_THRESHOLD", default_value_t = FREE_DELIVERY_THRESHOLD)]
    pub free_delivery_threshold: Decimal,

    /// Delivery fee below the threshold
    #[arg(long, env = "TRYNEX_DELIVERY_FEE", default_value_t = FLAT_DELIVERY_FEE)]
    pub delivery_fee: Decimal,
}

impl DeliveryConfig {
    /// Delivery policy described by these settings.
    pub fn policy(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            free_threshold: self.free_delivery_threshold,
            flat_fee: self.delivery_fee,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Cart commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the cart with its totals
    Show,

    /// Add a product to the cart
    Add(AddArgs),

    /// Set the quantity of a line; zero or below removes it
    Update {
        /// Line id
        id: LineItemId,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },

    /// Raise the quantity of a line by one
    Increment {
        /// Line id
        id: LineItemId,
    },

    /// Lower the quantity of a line by one
    Decrement {
        /// Line id
        id: LineItemId,
    },

    /// Remove a line
    Remove {
        /// Line id
        id: LineItemId,
    },

    /// Empty the cart
    Clear,

    /// Print the order that would be placed for the cart
    Checkout(CheckoutArgs),
}

/// Arguments of `add`.
#[derive(Debug, Args)]
pub struct AddArgs {
    /// Product name
    #[arg(long)]
    pub name: String,

    /// Unit price in taka
    #[arg(long)]
    pub price: String,

    /// Product image URL
    #[arg(long)]
    pub image_url: Option<String>,

    /// Quantity to add
    #[arg(short, long)]
    pub quantity: Option<NonZeroU32>,

    /// Size option
    #[arg(long)]
    pub size: Option<String>,

    /// Color option
    #[arg(long)]
    pub color: Option<String>,

    /// Instructions for the workshop
    #[arg(long)]
    pub instructions: Option<String>,

    /// Text to print or engrave
    #[arg(long)]
    pub text: Option<String>,

    /// Image file to print
    #[arg(long)]
    pub image: Option<PathBuf>,
}

/// Arguments of `checkout`.
#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// Customer name
    #[arg(long)]
    pub name: String,

    /// Mobile number
    #[arg(long)]
    pub phone: String,

    /// Delivery address
    #[arg(long)]
    pub address: String,

    /// Contact email
    #[arg(long)]
    pub email: Option<String>,

    /// Delivery notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Payment method
    #[arg(long, value_enum, default_value_t = Payment::CashOnDelivery)]
    pub payment: Payment,
}

/// Payment method accepted on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum Payment {
    /// Cash on delivery
    CashOnDelivery,

    /// bKash
    Bkash,

    /// Nagad
    Nagad,
}

impl From<Payment> for PaymentMethod {
    fn from(value: Payment) -> Self {
        match value {
            Payment::CashOnDelivery => Self::CashOnDelivery,
            Payment::Bkash => Self::Bkash,
            Payment::Nagad => Self::Nagad,
        }
    }
}
