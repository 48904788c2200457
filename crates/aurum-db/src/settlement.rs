//! # Invoice Settlement
//!
//! Turns a draft sales order into an invoice, and voids it again.
//!
//! ## generate_invoice
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ONE TRANSACTION                                │
//! │                                                                         │
//! │   1. order (Draft) + items          ──► NotFound / InvalidState         │
//! │   2. party snapshot, company snapshot                                   │
//! │   3. InvoiceItem snapshots (prices copied verbatim)                     │
//! │   4. totals, round-off                                                  │
//! │   5. grand total in words                                               │
//! │   6. FIFO payment allocation                                            │
//! │   7. next number of INV/{FY}/                                           │
//! │   8. INSERT header, items, allocations                                  │
//! │   9. deduct every line              ──► InsufficientStock (all lines)   │
//! │  10. order → Invoiced, outbox INVOICE_GENERATED                         │
//! │                                                                         │
//! │  COMMIT, or roll back everything                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Finalizing` and `Cancelling` are the open transaction itself; they are
//! never written. A failed attempt leaves the order in Draft and every stock
//! counter where it was.

use sqlx::{Connection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use aurum_core::fiscal::{business_date, format_invoice_number, invoice_prefix_with, FinancialYear};
use aurum_core::settlement::{allocate_payments, snapshot_item, InvoiceTotals};
use aurum_core::stock::{StockOp, StockRejection, StockShortfall};
use aurum_core::words::amount_in_words;
use aurum_core::{
    CallerContext, Invoice, InvoiceAggregate, InvoiceItem, InvoicePayment, InvoiceStatus, OrderStatus,
};

use crate::error::{DbError, LedgerError, LedgerResult};
use crate::ledger::{apply_in, LedgerOutcome};
use crate::pool::ServiceSettings;
use crate::repository::outbox::{self, INVOICE_CANCELLED, INVOICE_GENERATED};
use crate::repository::{invoice, order, party};

/// Order-to-invoice conversion and cancellation.
#[derive(Debug, Clone)]
pub struct InvoiceSettlement {
    pool: SqlitePool,
    settings: Arc<ServiceSettings>,
}

impl InvoiceSettlement {
    pub fn new(pool: SqlitePool, settings: Arc<ServiceSettings>) -> Self {
        InvoiceSettlement { pool, settings }
    }

    /// Settles a draft order into an invoice.
    ///
    /// Either everything happens (invoice written, stock deducted, order
    /// Invoiced, event queued) or nothing does.
    ///
    /// ## Errors
    /// - `NotFound`: no such order, or its party is gone
    /// - `InvalidState`: the order is not Draft, or has no items
    /// - `InsufficientStock`: one entry per line that could not be deducted
    /// - `ConcurrencyConflict`: lost every retry against concurrent writers
    pub async fn generate_invoice(
        &self,
        ctx: &CallerContext,
        order_id: &str,
    ) -> LedgerResult<InvoiceAggregate> {
        let this = self;
        let aggregate = self
            .settings
            .retry
            .run("generate_invoice", move || this.generate_once(ctx, order_id))
            .await?;

        info!(
            order_id,
            invoice_number = %aggregate.invoice.invoice_number,
            grand_total = aggregate.invoice.grand_total_paise,
            balance_due = aggregate.invoice.balance_due_paise,
            "Invoice generated"
        );
        Ok(aggregate)
    }

    async fn generate_once(
        &self,
        ctx: &CallerContext,
        order_id: &str,
    ) -> LedgerResult<InvoiceAggregate> {
        let mut tx = self.pool.begin().await?;

        let sales_order = order::draft_order(&mut tx, order_id).await?;

        let items = order::list_items(&mut tx, order_id).await?;
        if items.is_empty() {
            return Err(LedgerError::invalid_state("SalesOrder", order_id, "order has no items"));
        }

        let buyer = party::find(&mut tx, &sales_order.party_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Party", &sales_order.party_id))?;
        let company = &self.settings.company;

        let invoice_id = Uuid::new_v4().to_string();
        let invoice_items: Vec<InvoiceItem> = items
            .iter()
            .map(|item| snapshot_item(&invoice_id, Uuid::new_v4().to_string(), item))
            .collect();

        let totals = InvoiceTotals::from_items(&invoice_items)?;
        let grand_total_in_words = amount_in_words(totals.grand_total);

        let payments = order::list_payments(&mut tx, order_id).await?;
        let allocation = allocate_payments(&payments, totals.grand_total);
        let allocations: Vec<InvoicePayment> = allocation
            .allocations
            .iter()
            .map(|a| InvoicePayment {
                id: Uuid::new_v4().to_string(),
                invoice_id: invoice_id.clone(),
                payment_id: a.payment_id.clone(),
                allocated_paise: a.amount.paise(),
            })
            .collect();

        let fy = FinancialYear::for_instant(ctx.now);
        let prefix = &self.settings.invoice_prefix;
        let sequence = invoice::next_sequence(&mut tx, &invoice_prefix_with(prefix, fy)).await?;
        let invoice_number = format_invoice_number(prefix, fy, sequence);

        let header = Invoice {
            id: invoice_id,
            invoice_number,
            fiscal_year: fy.label(),
            sales_order_id: Some(sales_order.id.clone()),
            invoice_date: business_date(ctx.now),

            party_id: buyer.id,
            party_name: buyer.name,
            party_address: buyer.address,
            party_gstin: buyer.gstin,
            party_state_code: buyer.state_code,
            party_phone: buyer.phone,

            company_name: company.name.clone(),
            company_address: company.address.clone(),
            company_gstin: company.gstin.clone(),
            company_state_code: company.state_code.clone(),

            sub_total_paise: totals.sub_total.paise(),
            discount_paise: totals.discount.paise(),
            taxable_paise: totals.taxable.paise(),
            cgst_paise: totals.cgst.paise(),
            sgst_paise: totals.sgst.paise(),
            igst_paise: totals.igst.paise(),
            grand_total_paise: totals.grand_total.paise(),
            round_off_paise: totals.round_off.paise(),
            grand_total_in_words,
            total_paid_paise: allocation.total_paid.paise(),
            balance_due_paise: allocation.balance_due.paise(),

            status_id: InvoiceStatus::Active,
            created_at: ctx.now,
            created_by: ctx.user_id.clone(),
            updated_at: ctx.now,
            updated_by: ctx.user_id.clone(),
        };

        invoice::insert_invoice(&mut tx, &header).await?;
        invoice::insert_items(&mut tx, &invoice_items).await?;
        invoice::insert_allocations(&mut tx, &allocations).await?;

        let mut shortfalls = Vec::new();
        for item in &items {
            let outcome = apply_in(
                &mut tx,
                ctx,
                &item.item_id,
                Some(item.warehouse_id.as_str()),
                StockOp::Deduct(item.quantity),
                Some(header.invoice_number.as_str()),
            )
            .await?;

            let on_hand = match outcome {
                LedgerOutcome::Applied { .. } => continue,
                LedgerOutcome::Rejected(StockRejection::InsufficientOnHand { on_hand, .. }) => on_hand,
                LedgerOutcome::Rejected(_) | LedgerOutcome::Missing => 0,
            };
            shortfalls.push(StockShortfall::new(
                &item.item_id,
                Some(item.warehouse_id.as_str()),
                item.quantity,
                on_hand,
            ));
        }

        if !shortfalls.is_empty() {
            warn!(order_id, lines = shortfalls.len(), "Settlement rolled back: insufficient stock");
            return Err(LedgerError::InsufficientStock(shortfalls));
        }

        if !order::transition_status(&mut tx, order_id, OrderStatus::Draft, OrderStatus::Invoiced, ctx)
            .await?
        {
            return Err(DbError::stale("SalesOrder", order_id).into());
        }

        let aggregate = InvoiceAggregate {
            invoice: header,
            items: invoice_items,
            payments: allocations,
        };
        outbox::enqueue(&mut tx, INVOICE_GENERATED, &aggregate.invoice.id, &aggregate, ctx.now).await?;

        tx.commit().await?;
        Ok(aggregate)
    }

    /// Voids an invoice and puts its stock back.
    ///
    /// A line whose stock cannot be restored is logged and skipped; the
    /// invoice is cancelled regardless. Items and allocations are kept.
    pub async fn cancel_invoice(
        &self,
        ctx: &CallerContext,
        invoice_number: &str,
    ) -> LedgerResult<InvoiceAggregate> {
        let this = self;
        let aggregate = self
            .settings
            .retry
            .run("cancel_invoice", move || this.cancel_once(ctx, invoice_number))
            .await?;

        info!(invoice_number, "Invoice cancelled");
        Ok(aggregate)
    }

    async fn cancel_once(
        &self,
        ctx: &CallerContext,
        invoice_number: &str,
    ) -> LedgerResult<InvoiceAggregate> {
        let mut tx = self.pool.begin().await?;

        let header = invoice::find_by_number(&mut tx, invoice_number)
            .await?
            .ok_or_else(|| LedgerError::not_found("Invoice", invoice_number))?;
        if header.is_cancelled() {
            return Err(LedgerError::invalid_state("Invoice", invoice_number, "already cancelled"));
        }

        let items = invoice::list_items(&mut tx, &header.id).await?;
        for item in &items {
            // savepoint per line: a skipped line leaves neither counter nor journal behind
            let mut line_tx = Connection::begin(&mut *tx).await?;
            let result = apply_in(
                &mut line_tx,
                ctx,
                &item.item_id,
                Some(item.warehouse_id.as_str()),
                StockOp::Restore(item.quantity),
                Some(invoice_number),
            )
            .await;

            let result = match result {
                Ok(outcome) => {
                    line_tx.commit().await?;
                    Ok(outcome)
                }
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => {
                    line_tx.rollback().await?;
                    Err(e)
                }
            };

            match result {
                Ok(LedgerOutcome::Applied { .. }) => {}
                Ok(LedgerOutcome::Missing) => warn!(
                    invoice_number,
                    item_id = %item.item_id,
                    warehouse_id = %item.warehouse_id,
                    "No stock record to restore into; skipped"
                ),
                Ok(LedgerOutcome::Rejected(rejection)) => warn!(
                    invoice_number,
                    item_id = %item.item_id,
                    ?rejection,
                    "Restore rejected; skipped"
                ),
                Err(e) => warn!(
                    invoice_number,
                    item_id = %item.item_id,
                    error = %e,
                    "Restore failed; skipped"
                ),
            }
        }

        if !invoice::transition_status(
            &mut tx,
            &header.id,
            InvoiceStatus::Active,
            InvoiceStatus::Cancelled,
            ctx,
        )
        .await?
        {
            return Err(DbError::stale("Invoice", invoice_number).into());
        }

        if let Some(order_id) = &header.sales_order_id {
            let moved = order::transition_status(
                &mut tx,
                order_id,
                OrderStatus::Invoiced,
                OrderStatus::Cancelled,
                ctx,
            )
            .await?;
            if !moved {
                warn!(invoice_number, order_id = %order_id, "Linked order was not Invoiced");
            }
        }

        let header = invoice::find_by_number(&mut tx, invoice_number)
            .await?
            .ok_or_else(|| LedgerError::not_found("Invoice", invoice_number))?;
        let aggregate = invoice::load_aggregate(&mut tx, header).await?;
        outbox::enqueue(&mut tx, INVOICE_CANCELLED, &aggregate.invoice.id, &aggregate, ctx.now).await?;

        tx.commit().await?;
        Ok(aggregate)
    }

    /// The invoice aggregate for `invoice_number`.
    pub async fn get_invoice(&self, invoice_number: &str) -> LedgerResult<InvoiceAggregate> {
        let mut conn = self.pool.acquire().await?;
        let header = invoice::find_by_number(&mut conn, invoice_number)
            .await?
            .ok_or_else(|| LedgerError::not_found("Invoice", invoice_number))?;

        debug!(invoice_number, "Loaded invoice");
        Ok(invoice::load_aggregate(&mut conn, header).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pool::{Database, DbConfig};
    use crate::repository::order::NewOrderItem;
    use crate::retry::RetryPolicy;
    use aurum_core::pricing::LinePrice;
    use aurum_core::{Party, PaymentMethod, SalesOrder};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn june() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 6, 0, 0).unwrap()
    }

    async fn setup() -> (Database, CallerContext) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ctx = CallerContext::new("cashier-1").at(june());

        db.parties()
            .upsert(&Party {
                id: "party-1".into(),
                name: "Meera Shah".into(),
                address: "Dadar, Mumbai".into(),
                gstin: None,
                state_code: "27".into(),
                phone: None,
                updated_at: ctx.now,
            })
            .await
            .unwrap();

        let ledger = db.stock_ledger();
        ledger.open_record(&ctx, "ring-1", "wh-main", 5).await.unwrap();
        ledger.open_record(&ctx, "chain-1", "wh-main", 3).await.unwrap();

        (db, ctx)
    }

    /// ₹1,000 taxable with 9% + 9%.
    fn price(quantity: i64) -> LinePrice {
        LinePrice {
            line_amount_paise: 100_000 * quantity,
            taxable_paise: 100_000 * quantity,
            gst_rate_bps: 1_800,
            cgst_paise: 9_000 * quantity,
            sgst_paise: 9_000 * quantity,
            total_paise: 118_000 * quantity,
            ..Default::default()
        }
    }

    fn line(item_id: &str, quantity: i64, price: LinePrice) -> NewOrderItem {
        NewOrderItem {
            item_id: item_id.into(),
            warehouse_id: None,
            sku: format!("{}-SKU", item_id.to_uppercase()),
            description: format!("{} 22K", item_id),
            hsn_code: "7113".into(),
            purity_label: "22K".into(),
            quantity,
            price,
        }
    }

    async fn draft(db: &Database, ctx: &CallerContext, lines: &[NewOrderItem]) -> SalesOrder {
        let order = db.orders().create_draft(ctx, "party-1", "wh-main").await.unwrap();
        for l in lines {
            db.orders().add_item(ctx, &order.id, l).await.unwrap();
        }
        order
    }

    async fn stock(db: &Database, item_id: &str) -> (i64, i64) {
        let r = db.stock_ledger().get_by_item(item_id, None).await.unwrap().unwrap();
        (r.quantity, r.reserved_quantity)
    }

    #[tokio::test]
    async fn test_generate_invoice_totals_and_words() {
        let (db, ctx) = setup().await;
        let order = draft(&db, &ctx, &[line("ring-1", 1, price(1))]).await;

        let aggregate = db.settlement().generate_invoice(&ctx, &order.id).await.unwrap();
        let invoice = &aggregate.invoice;

        assert_eq!(invoice.invoice_number, "INV/2026-27/000001");
        assert_eq!(invoice.fiscal_year, "2026-27");
        assert_eq!(invoice.taxable_paise, 100_000);
        assert_eq!(invoice.cgst_paise, 9_000);
        assert_eq!(invoice.sgst_paise, 9_000);
        assert_eq!(invoice.grand_total_paise, 118_000);
        assert_eq!(invoice.round_off_paise, 0);
        assert_eq!(invoice.grand_total_in_words, "One Thousand One Hundred Eighty Rupees");
        assert_eq!(invoice.balance_due_paise, 118_000);
        assert_eq!(invoice.party_name, "Meera Shah");
        assert_eq!(invoice.company_gstin, "27AAACA0000A1Z5");
        assert_eq!(aggregate.items.len(), 1);
        assert_eq!(aggregate.items[0].price, price(1));

        assert_eq!(stock(&db, "ring-1").await, (4, 0));

        let order = db.orders().get(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Invoiced);

        let events = db.outbox().get_pending(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, INVOICE_GENERATED);

        let stored = db.settlement().get_invoice("INV/2026-27/000001").await.unwrap();
        assert_eq!(stored.items, aggregate.items);
    }

    #[tokio::test]
    async fn test_round_off() {
        let (db, ctx) = setup().await;
        let odd = LinePrice {
            line_amount_paise: 99_990,
            taxable_paise: 99_990,
            gst_rate_bps: 300,
            cgst_paise: 1_500,
            sgst_paise: 1_500,
            total_paise: 102_990,
            ..Default::default()
        };
        let order = draft(&db, &ctx, &[line("ring-1", 1, odd)]).await;

        let invoice = db.settlement().generate_invoice(&ctx, &order.id).await.unwrap().invoice;
        assert_eq!(invoice.grand_total_paise, 103_000);
        assert_eq!(invoice.round_off_paise, 10);
        assert_eq!(
            invoice.grand_total_paise,
            invoice.taxable_paise + invoice.cgst_paise + invoice.sgst_paise + invoice.round_off_paise
        );
    }

    #[tokio::test]
    async fn test_totals_overflow_fails_without_side_effects() {
        let (db, ctx) = setup().await;
        let order = draft(&db, &ctx, &[line("ring-1", 1, price(1)), line("chain-1", 1, price(1))]).await;

        // rows written before line prices were validated
        sqlx::query(
            "UPDATE sales_order_items SET line_amount_paise = ?1, taxable_paise = ?1, total_paise = ?1 WHERE order_id = ?2",
        )
        .bind(5_000_000_000_000_000_000_i64)
        .bind(&order.id)
        .execute(db.pool())
        .await
        .unwrap();

        let err = db.settlement().generate_invoice(&ctx, &order.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let order = db.orders().get(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Draft);
        assert_eq!(stock(&db, "ring-1").await, (5, 1));
        assert!(db.invoices().get_by_order(&order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payments_allocated_fifo() {
        let (db, ctx) = setup().await;
        let order = draft(&db, &ctx, &[line("ring-1", 1, price(1))]).await;

        let orders = db.orders();
        let later = ctx.clone().at(ctx.now + Duration::minutes(5));
        let p2 = orders
            .add_payment(&later, &order.id, PaymentMethod::Card, 90_000, None)
            .await
            .unwrap();
        let p1 = orders
            .add_payment(&ctx, &order.id, PaymentMethod::Cash, 50_000, None)
            .await
            .unwrap();
        let p3 = orders
            .add_payment(&later.clone().at(later.now + Duration::minutes(1)), &order.id, PaymentMethod::Upi, 20_000, None)
            .await
            .unwrap();

        let aggregate = db.settlement().generate_invoice(&ctx, &order.id).await.unwrap();

        let allocated: Vec<(String, i64)> = aggregate
            .payments
            .iter()
            .map(|p| (p.payment_id.clone(), p.allocated_paise))
            .collect();
        assert_eq!(allocated, vec![(p1.id, 50_000), (p2.id, 68_000)]);
        assert!(!aggregate.payments.iter().any(|p| p.payment_id == p3.id));
        assert_eq!(aggregate.invoice.total_paid_paise, 118_000);
        assert_eq!(aggregate.invoice.balance_due_paise, 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_lists_every_line_and_rolls_back() {
        let (db, ctx) = setup().await;
        let order = draft(&db, &ctx, &[line("ring-1", 3, price(3)), line("chain-1", 2, price(2))]).await;

        // walk-in sales take the shelf stock out from under the reservations
        let ledger = db.stock_ledger();
        assert!(ledger.deduct(&ctx, "ring-1", Some("wh-main"), 4).await.unwrap());
        assert!(ledger.deduct(&ctx, "chain-1", Some("wh-main"), 2).await.unwrap());
        let before = (stock(&db, "ring-1").await, stock(&db, "chain-1").await);

        let err = db.settlement().generate_invoice(&ctx, &order.id).await.unwrap_err();
        match err {
            LedgerError::InsufficientStock(lines) => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0].item_id, "ring-1");
                assert_eq!(lines[0].requested, 3);
                assert_eq!(lines[0].available, 1);
                assert_eq!(lines[1].item_id, "chain-1");
                assert_eq!(lines[1].available, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!((stock(&db, "ring-1").await, stock(&db, "chain-1").await), before);
        let order = db.orders().get(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Draft);
        assert!(db.invoices().get_by_order(&order.id).await.unwrap().is_none());
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);

        // the failed attempt consumed no number
        ledger.restore(&ctx, "ring-1", Some("wh-main"), 5).await.unwrap();
        ledger.restore(&ctx, "chain-1", Some("wh-main"), 5).await.unwrap();
        let invoice = db.settlement().generate_invoice(&ctx, &order.id).await.unwrap().invoice;
        assert_eq!(invoice.invoice_number, "INV/2026-27/000001");
    }

    #[tokio::test]
    async fn test_order_state_checks() {
        let (db, ctx) = setup().await;
        let settlement = db.settlement();

        let err = settlement.generate_invoice(&ctx, "order-9").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let empty = draft(&db, &ctx, &[]).await;
        let err = settlement.generate_invoice(&ctx, &empty.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let order = draft(&db, &ctx, &[line("ring-1", 1, price(1))]).await;
        settlement.generate_invoice(&ctx, &order.id).await.unwrap();
        let err = settlement.generate_invoice(&ctx, &order.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = db
            .orders()
            .add_item(&ctx, &order.id, &line("chain-1", 1, price(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_numbers_are_sequential_per_financial_year() {
        let (db, ctx) = setup().await;
        let settlement = db.settlement();

        let mut numbers = Vec::new();
        for _ in 0..2 {
            let order = draft(&db, &ctx, &[line("ring-1", 1, price(1))]).await;
            numbers.push(settlement.generate_invoice(&ctx, &order.id).await.unwrap().invoice.invoice_number);
        }

        // 00:30 IST on 1 April 2027 is still 31 March in UTC
        let new_year = ctx.clone().at(Utc.with_ymd_and_hms(2027, 3, 31, 19, 0, 0).unwrap());
        let order = draft(&db, &new_year, &[line("ring-1", 1, price(1))]).await;
        numbers.push(
            settlement
                .generate_invoice(&new_year, &order.id)
                .await
                .unwrap()
                .invoice
                .invoice_number,
        );

        assert_eq!(
            numbers,
            vec!["INV/2026-27/000001", "INV/2026-27/000002", "INV/2027-28/000001"]
        );
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_keeps_rows() {
        let (db, ctx) = setup().await;
        let order = draft(&db, &ctx, &[line("ring-1", 3, price(3))]).await;
        let settled = db.settlement().generate_invoice(&ctx, &order.id).await.unwrap();
        assert_eq!(stock(&db, "ring-1").await, (2, 0));

        let manager = CallerContext::new("manager-1").at(ctx.now + Duration::hours(2));
        let cancelled = db
            .settlement()
            .cancel_invoice(&manager, &settled.invoice.invoice_number)
            .await
            .unwrap();

        assert_eq!(stock(&db, "ring-1").await, (5, 0));
        assert_eq!(cancelled.invoice.status_id, InvoiceStatus::Cancelled);
        assert_eq!(cancelled.invoice.updated_by, "manager-1");
        assert_eq!(cancelled.items, settled.items);
        assert_eq!(cancelled.payments, settled.payments);

        let order = db.orders().get(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        let err = db
            .settlement()
            .cancel_invoice(&manager, &settled.invoice.invoice_number)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = db.settlement().cancel_invoice(&manager, "INV/2026-27/999999").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert_eq!(db.outbox().count_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancel_skips_missing_stock_record() {
        let (db, ctx) = setup().await;
        let order = draft(&db, &ctx, &[line("ring-1", 1, price(1)), line("chain-1", 1, price(1))]).await;
        let settled = db.settlement().generate_invoice(&ctx, &order.id).await.unwrap();

        sqlx::query("DELETE FROM stock_movements WHERE item_id = 'chain-1'")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("DELETE FROM stock_records WHERE item_id = 'chain-1'")
            .execute(db.pool())
            .await
            .unwrap();

        let cancelled = db
            .settlement()
            .cancel_invoice(&ctx, &settled.invoice.invoice_number)
            .await
            .unwrap();
        assert!(cancelled.invoice.is_cancelled());
        assert_eq!(stock(&db, "ring-1").await, (5, 0));
    }

    #[tokio::test]
    async fn test_cancel_failed_line_leaves_no_partial_restore() {
        let (db, ctx) = setup().await;
        let order = draft(&db, &ctx, &[line("ring-1", 1, price(1)), line("chain-1", 1, price(1))]).await;
        let settled = db.settlement().generate_invoice(&ctx, &order.id).await.unwrap();
        assert_eq!(stock(&db, "chain-1").await, (2, 0));

        // the counter update for chain-1 succeeds, its journal row does not
        sqlx::query(
            "CREATE TRIGGER journal_closed BEFORE INSERT ON stock_movements \
             WHEN NEW.item_id = 'chain-1' AND NEW.kind = 'restore' \
             BEGIN SELECT RAISE(ABORT, 'journal closed'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let cancelled = db
            .settlement()
            .cancel_invoice(&ctx, &settled.invoice.invoice_number)
            .await
            .unwrap();
        assert!(cancelled.invoice.is_cancelled());
        assert_eq!(stock(&db, "ring-1").await, (5, 0));
        assert_eq!(stock(&db, "chain-1").await, (2, 0));

        let restores: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_movements WHERE kind = 'restore'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(restores, 1);
    }

    #[tokio::test]
    async fn test_concurrent_settlements_get_unique_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("settle.db")).max_connections(4))
            .await
            .unwrap()
            .with_settings(ServiceSettings {
                retry: RetryPolicy {
                    max_attempts: 50,
                    initial_backoff: std::time::Duration::from_millis(1),
                    max_backoff: std::time::Duration::from_millis(20),
                },
                ..Default::default()
            });
        let ctx = CallerContext::new("cashier-1").at(june());
        db.parties()
            .upsert(&Party {
                id: "party-1".into(),
                name: "Meera Shah".into(),
                address: "Dadar, Mumbai".into(),
                gstin: None,
                state_code: "27".into(),
                phone: None,
                updated_at: ctx.now,
            })
            .await
            .unwrap();
        db.stock_ledger().open_record(&ctx, "ring-1", "wh-main", 10).await.unwrap();

        let mut orders = Vec::new();
        for _ in 0..6 {
            orders.push(draft(&db, &ctx, &[line("ring-1", 1, price(1))]).await);
        }

        let mut handles = Vec::new();
        for order in orders {
            let settlement = db.settlement();
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                settlement.generate_invoice(&ctx, &order.id).await
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().invoice.invoice_number);
        }

        numbers.sort();
        numbers.dedup();
        let expected: Vec<String> = (1..=6).map(|n| format!("INV/2026-27/{n:06}")).collect();
        assert_eq!(numbers, expected);
        assert_eq!(stock(&db, "ring-1").await, (4, 0));
    }
}
