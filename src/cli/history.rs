use super::ui;
use crate::core::{AttemptId, FetchAttempt, RateStore, StoredRate};
use anyhow::{Context, Result};
use comfy_table::Cell;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn attempts_table(attempts: &[FetchAttempt]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("ID"),
        ui::header_cell("Request time"),
        ui::header_cell("URL"),
        ui::header_cell("Status"),
    ]);

    for attempt in attempts {
        table.add_row(vec![
            ui::number_cell(attempt.id),
            Cell::new(attempt.request_time.format(TIME_FORMAT)),
            Cell::new(&attempt.api_url),
            ui::status_cell(attempt.status),
        ]);
    }
    table.to_string()
}

pub fn rates_table(rates: &[StoredRate]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Nominal"),
        ui::header_cell("Rate"),
    ]);

    for stored in rates {
        let record = &stored.record;
        table.add_row(vec![
            Cell::new(&record.code),
            Cell::new(&record.name),
            ui::number_cell(record.nominal),
            ui::number_cell(format!("{:.4}", record.rate)),
        ]);
    }
    table.to_string()
}

/// Prints the most recent attempts.
pub async fn display_history(store: &dyn RateStore, limit: i64) -> Result<()> {
    let attempts = store
        .list_attempts(limit)
        .await
        .context("Failed to load request history")?;

    println!("{}", ui::style_text("Recent requests", ui::StyleType::Title));
    if attempts.is_empty() {
        println!("{}", ui::style_text("No requests recorded yet", ui::StyleType::Subtle));
        return Ok(());
    }
    println!("{}", attempts_table(&attempts));
    Ok(())
}

/// Prints the rates stored for one attempt.
pub async fn display_rates(store: &dyn RateStore, attempt_id: AttemptId) -> Result<()> {
    let rates = store
        .list_rates(attempt_id)
        .await
        .with_context(|| format!("Failed to load rates for request {attempt_id}"))?;

    let title = format!("Rates for request {attempt_id}");
    println!("{}", ui::style_text(&title, ui::StyleType::Title));
    if rates.is_empty() {
        println!("{}", ui::style_text("No rates stored", ui::StyleType::Subtle));
        return Ok(());
    }
    println!("{}", rates_table(&rates));
    Ok(())
}
