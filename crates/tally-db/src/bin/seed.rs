//! # Seed Data Generator
//!
//! Populates the database with demo clients, products, orders and invoices.
//!
//! ## Usage
//! ```bash
//! # 25 clients, 3 orders each (default)
//! cargo run -p tally-db --bin seed
//!
//! # Custom amounts
//! cargo run -p tally-db --bin seed -- --clients 100 --orders 5
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! - Products across building-supply categories, SKU `{CATEGORY}-{INDEX:03}`
//! - Clients with a small opening balance on every fourth one
//! - Orders of 1-4 lines, some invoiced (with a part payment), some canceled
//!
//! Everything goes through the repositories, so client debt and the debt
//! journal end up consistent with the generated orders.

use std::env;
use tally_core::{
    InvoiceOverrides, NewClient, NewProduct, OrderDraft, PaymentDraft, PaymentMethod, Product,
};
use tally_db::{Database, DbConfig};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[(&str, i64)])] = &[
    (
        "CEM",
        &[
            ("Cement 25kg", 650),
            ("Cement 50kg", 1200),
            ("White Cement 25kg", 980),
            ("Tile Adhesive 20kg", 1450),
            ("Grout 5kg", 520),
        ],
    ),
    (
        "STL",
        &[
            ("Rebar 8mm", 540),
            ("Rebar 10mm", 690),
            ("Rebar 12mm", 850),
            ("Wire Mesh 2x3m", 2300),
            ("Tie Wire 1kg", 310),
        ],
    ),
    (
        "HDW",
        &[
            ("Wood Screws (100)", 275),
            ("Door Hinge", 450),
            ("Padlock 40mm", 990),
            ("Anchor Bolts (20)", 380),
            ("Cabinet Handle", 160),
        ],
    ),
    (
        "PLB",
        &[
            ("PVC Pipe 32mm 4m", 720),
            ("PVC Elbow 32mm", 90),
            ("Ball Valve 1/2\"", 640),
            ("Teflon Tape", 60),
            ("Sink Trap", 430),
        ],
    ),
    (
        "PNT",
        &[
            ("Wall Paint 15L", 5400),
            ("Primer 5L", 2100),
            ("Paint Roller", 380),
            ("Brush Set", 450),
            ("Masking Tape", 120),
        ],
    ),
];

/// Client names for realistic test data
const CLIENT_NAMES: &[&str] = &[
    "Atelier Benali",
    "Quincaillerie Amrani",
    "Entreprise Saidi BTP",
    "Menuiserie Khelifi",
    "Plomberie Haddad",
    "Batimat Oran",
    "Sarl Bouzid & Fils",
    "Peinture Meziane",
    "Chantier Tlemcen Nord",
    "Ferronnerie Djebbar",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut clients: usize = 25;
    let mut orders_per_client: usize = 3;
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" | "-c" => {
                if i + 1 < args.len() {
                    clients = args[i + 1].parse().unwrap_or(25);
                    i += 1;
                }
            }
            "--orders" | "-o" => {
                if i + 1 < args.len() {
                    orders_per_client = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --clients <N>  Number of clients to generate (default: 25)");
                println!("  -o, --orders <N>   Orders per client (default: 3)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Clients:  {}", clients);
    println!("Orders:   {} per client", orders_per_client);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing data
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Products
    println!();
    println!("Generating products...");
    let mut catalogue: Vec<Product> = Vec::new();
    for (category, items) in CATEGORIES {
        for (idx, (name, price_cents)) in items.iter().enumerate() {
            let product = NewProduct {
                sku: Some(format!("{}-{:03}", category, idx + 1)),
                name: name.to_string(),
                description: None,
                unit_price_cents: *price_cents,
                currency: "DZD".to_string(),
            };

            match db.products().create(&product).await {
                Ok(created) => catalogue.push(created),
                Err(e) => eprintln!("Failed to insert {}: {}", name, e),
            }
        }
    }
    println!("  Generated {} products", catalogue.len());

    if catalogue.is_empty() {
        return Err("no products were created".into());
    }

    // Clients and their orders
    println!();
    println!("Generating clients and orders...");
    let mut created_orders = 0;
    let mut invoiced = 0;
    let mut canceled = 0;

    for seed in 0..clients {
        let base = CLIENT_NAMES[seed % CLIENT_NAMES.len()];
        let name = if seed < CLIENT_NAMES.len() {
            base.to_string()
        } else {
            format!("{} #{}", base, seed / CLIENT_NAMES.len() + 1)
        };

        let client = db
            .clients()
            .create(&NewClient {
                name,
                phone: Some(format!("0555 {:02} {:02} {:02}", seed % 100, (seed * 7) % 100, (seed * 13) % 100)),
                address: None,
                debt_cents: if seed % 4 == 0 { 1500 } else { 0 },
            })
            .await?;

        for n in 0..orders_per_client {
            let order_seed = seed * 31 + n * 7;
            let line_count = 1 + order_seed % 4;

            let items = (0..line_count)
                .map(|line| {
                    let product = &catalogue[(order_seed + line * 5) % catalogue.len()];
                    let qty = 1 + ((order_seed + line) % 10) as i64;
                    let discount = [0, 0, 5, 10][(order_seed + line) % 4];
                    product.to_order_item(qty, discount)
                })
                .collect();

            let order = db
                .orders()
                .create_order(&OrderDraft {
                    client_id: client.id,
                    notes: None,
                    discount_percent: 0,
                    issue_date: None,
                    due_date: None,
                    items,
                })
                .await?;
            created_orders += 1;

            match order_seed % 5 {
                // Invoiced with a part payment
                0 => {
                    let invoice = db
                        .invoices()
                        .create_invoice_from_order(order.id, &InvoiceOverrides::default())
                        .await?;
                    db.invoices()
                        .record_payment(&PaymentDraft {
                            invoice_id: invoice.id,
                            amount_cents: (invoice.total_cents / 2).max(1),
                            method: PaymentMethod::Cash,
                            reference: None,
                            paid_at: None,
                            notes: None,
                        })
                        .await?;
                    invoiced += 1;
                }
                // Canceled before anything was invoiced
                3 => {
                    db.orders().cancel_order_and_adjust_debt(order.id).await?;
                    canceled += 1;
                }
                _ => {}
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} clients, {} orders ({} invoiced, {} canceled) in {:?}",
        clients, created_orders, invoiced, canceled, elapsed
    );

    // Quick sanity check
    println!();
    println!("Verifying...");
    let (page, total) = db.clients().list("", 5, 0).await?;
    println!("  Clients: {} total", total);
    for client in page {
        println!("    {:<32} {}", client.name, client.debt());
    }

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
