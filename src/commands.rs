//! Cart commands

use std::io::{self, Write};

use tabled::{Table, Tabled, settings::Style};
use thiserror::Error;
use tracing::{info, warn};
use trynex_cart::prelude::*;

use crate::config::{AddArgs, CheckoutArgs, Command};

/// Errors surfaced to the command line.
#[derive(Debug, Error)]
pub(crate) enum CommandError {
    /// The product given to `add` is invalid.
    #[error(transparent)]
    Product(#[from] ProductError),

    /// The customization given to `add` is invalid.
    #[error(transparent)]
    Customization(#[from] CustomizationError),

    /// The checkout details are invalid or the cart is empty.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The order could not be rendered.
    #[error("failed to render order")]
    Render(#[from] serde_json::Error),

    /// Output could not be written.
    #[error("failed to write output")]
    Output(#[from] io::Error),
}

#[derive(Tabled)]
struct CartRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Item")]
    name: String,
    #[tabled(rename = "Options")]
    options: String,
    #[tabled(rename = "Unit")]
    unit_price: String,
    #[tabled(rename = "Qty")]
    quantity: u32,
    #[tabled(rename = "Total")]
    line_total: String,
}

impl From<&LineItem> for CartRow {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.id().to_string(),
            name: item.name().to_string(),
            options: item
                .customization()
                .map(Customization::describe)
                .unwrap_or_default(),
            unit_price: taka(item.unit_price()).to_string(),
            quantity: item.quantity().get(),
            line_total: taka(item.line_total()).to_string(),
        }
    }
}

/// Runs a command against the cart, writing its report to `out`.
pub(crate) async fn run(
    store: &CartStore,
    command: Command,
    policy: &DeliveryPolicy,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    match command {
        Command::Show => {}
        Command::Add(args) => add(store, args, out).await?,
        Command::Update { id, quantity } => store.update_quantity(id, quantity),
        Command::Increment { id } => store.increment(id),
        Command::Decrement { id } => store.decrement(id),
        Command::Remove { id } => store.remove_item(id),
        Command::Clear => store.clear(),
        Command::Checkout(args) => return checkout(store, args, policy, out),
    }

    show(store, policy, out)
}

async fn add(store: &CartStore, args: AddArgs, out: &mut impl Write) -> Result<(), CommandError> {
    let mut product = Product::parse(args.name, &args.price)?;

    if let Some(image_url) = args.image_url {
        product = product.with_image_url(image_url);
    }

    let options = CustomizationOptions {
        size: args.size,
        color: args.color,
        instructions: args.instructions,
    };

    let customized = args.image.is_some()
        || args.text.is_some()
        || args.quantity.is_some()
        || options != CustomizationOptions::default();

    let request = if customized {
        let mut request = match args.image {
            Some(path) => CustomizationRequest::image(FileImage::new(path)),
            None => CustomizationRequest::plain(),
        };

        if let Some(text) = args.text {
            request = request.with_text(text)?;
        }

        if let Some(quantity) = args.quantity {
            request = request.with_quantity(quantity);
        }

        Some(request.with_options(options))
    } else {
        None
    };

    let added = store.add_item(&product, request).await;

    info!(id = %added.id, "added line");

    if let Some(image_error) = added.dropped_image {
        warn!(%image_error, "image was not attached");
        writeln!(out, "Image was not attached: {image_error}")?;
    }

    writeln!(out, "Added {} as {}", product.name(), added.id)?;

    Ok(())
}

fn show(
    store: &CartStore,
    policy: &DeliveryPolicy,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let items = store.items();

    if items.is_empty() {
        writeln!(out, "Cart is empty")?;
        return Ok(());
    }

    let mut table = Table::new(items.iter().map(CartRow::from));
    table.with(Style::rounded());

    let summary = CheckoutSummary::from_items(&items, policy);

    writeln!(out, "{table}")?;
    writeln!(out, "Items:    {}", summary.total_items)?;
    writeln!(out, "Subtotal: {}", taka(summary.subtotal))?;

    if summary.has_free_delivery() {
        writeln!(out, "Delivery: free")?;
    } else {
        writeln!(out, "Delivery: {}", taka(summary.delivery_fee))?;
    }

    writeln!(out, "Total:    {}", taka(summary.grand_total))?;

    Ok(())
}

fn checkout(
    store: &CartStore,
    args: CheckoutArgs,
    policy: &DeliveryPolicy,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let mut customer = CustomerDetails::new(&args.name, &args.phone, &args.address)?;

    if let Some(email) = args.email {
        customer = customer.with_email(email);
    }

    if let Some(notes) = args.notes {
        customer = customer.with_notes(notes);
    }

    let draft = OrderDraft::from_items(&store.items(), customer, args.payment.into(), policy)?;

    writeln!(out, "{}", serde_json::to_string_pretty(&draft)?)?;

    Ok(())
}
