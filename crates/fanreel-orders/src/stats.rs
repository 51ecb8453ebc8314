//! Creator and platform analytics
//!
//! Derives rolling earnings windows, rankings, and daily aggregates from
//! the order and settlement history. Stat rows are created lazily on
//! first read; lifecycle triggers keep the counters moving.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use uuid::Uuid;

use fanreel_common::{MarketError, MarketResult};

use crate::model::{
    CreatorStats, DailyPlatformStats, Order, OrderStatus, Payment, PlatformRevenue,
};
use crate::store::{OrderStore, StatsStore};

/// Rolling-window length for creator analytics, in days
const ANALYTICS_WINDOW_DAYS: i64 = 30;
/// Short window for recent-earnings figures, in days
const RECENT_WINDOW_DAYS: i64 = 7;
/// How many top earning days to report
const TOP_DAYS: usize = 5;

/// Administrative patch for a creator stat row
#[derive(Debug, Clone, Default)]
pub struct CreatorStatsPatch {
    pub total_orders: Option<u64>,
    pub completed_orders: Option<u64>,
    pub rejected_orders: Option<u64>,
    pub total_earnings_cents: Option<i64>,
    pub last_order_at: Option<DateTime<Utc>>,
}

/// Earnings total for a single day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyEarnings {
    pub date: NaiveDate,
    pub earnings_cents: i64,
}

/// Creator stat row combined with derived rolling windows
#[derive(Debug, Clone, Serialize)]
pub struct CreatorAnalytics {
    pub stats: CreatorStats,
    pub orders_30d: u64,
    pub earnings_30d_cents: i64,
    pub earnings_7d_cents: i64,
    /// Top earning days inside the trailing 30, best first
    pub top_days: Vec<DailyEarnings>,
    /// Share of other creators earning strictly less over the trailing 30
    /// days; absent when there are no other creators to rank against
    pub percentile_rank: Option<Decimal>,
}

/// Platform-wide totals over a window, with growth vs the prior window
#[derive(Debug, Clone, Serialize)]
pub struct PlatformAnalytics {
    pub window_days: i64,
    pub net_revenue_cents: i64,
    pub order_count: u64,
    pub active_creators: u64,
    pub active_fans: u64,
    pub revenue_growth_pct: Decimal,
    pub order_growth_pct: Decimal,
}

/// Percentage growth, defined as 0 when the previous window is empty
fn pct_growth(current: i64, previous: i64) -> Decimal {
    if previous == 0 {
        return dec!(0);
    }
    (Decimal::from(current) - Decimal::from(previous)) / Decimal::from(previous) * dec!(100)
}

/// Derives analytics from order/settlement history
pub struct StatsAggregator {
    stats: Arc<dyn StatsStore>,
    orders: Arc<dyn OrderStore>,
}

impl StatsAggregator {
    pub fn new(stats: Arc<dyn StatsStore>, orders: Arc<dyn OrderStore>) -> Self {
        Self { stats, orders }
    }

    /// Creator stat row, creating a zeroed one on first read
    pub async fn get_creator_stats(&self, creator_id: Uuid) -> MarketResult<CreatorStats> {
        if let Some(stats) = self
            .stats
            .get_creator(creator_id)
            .await
            .map_err(MarketError::from_store)?
        {
            return Ok(stats);
        }

        let fresh = CreatorStats::zeroed(creator_id);
        self.stats.put_creator(&fresh).await.map_err(MarketError::from_store)?;
        Ok(fresh)
    }

    /// Direct administrative update of a creator stat row
    pub async fn update_creator_stats(
        &self,
        creator_id: Uuid,
        patch: CreatorStatsPatch,
    ) -> MarketResult<CreatorStats> {
        let mut stats = self.get_creator_stats(creator_id).await?;

        if let Some(v) = patch.total_orders {
            stats.total_orders = v;
        }
        if let Some(v) = patch.completed_orders {
            stats.completed_orders = v;
        }
        if let Some(v) = patch.rejected_orders {
            stats.rejected_orders = v;
        }
        if let Some(v) = patch.total_earnings_cents {
            stats.total_earnings_cents = v;
        }
        if let Some(v) = patch.last_order_at {
            stats.last_order_at = Some(v);
        }
        stats.updated_at = Utc::now();

        self.stats.put_creator(&stats).await.map_err(MarketError::from_store)?;
        Ok(stats)
    }

    /// Lifecycle trigger: a new order landed for the creator
    pub async fn record_order_created(&self, order: &Order) -> MarketResult<()> {
        let mut stats = self.get_creator_stats(order.creator_id).await?;
        stats.total_orders += 1;
        stats.last_order_at = Some(order.created_at);
        stats.updated_at = Utc::now();
        self.stats.put_creator(&stats).await.map_err(MarketError::from_store)
    }

    /// Lifecycle trigger: the creator rejected an order
    pub async fn record_order_rejected(&self, order: &Order) -> MarketResult<()> {
        let mut stats = self.get_creator_stats(order.creator_id).await?;
        stats.rejected_orders += 1;
        stats.updated_at = Utc::now();
        self.stats.put_creator(&stats).await.map_err(MarketError::from_store)
    }

    /// Lifecycle trigger: an order completed and settled
    ///
    /// Bumps the creator counters and writes both revenue ledgers.
    pub async fn record_order_completed(
        &self,
        order: &Order,
        settlement: &Payment,
    ) -> MarketResult<()> {
        let mut stats = self.get_creator_stats(order.creator_id).await?;
        stats.completed_orders += 1;
        stats.total_earnings_cents += order.creator_earnings_cents;
        stats.updated_at = Utc::now();
        self.stats.put_creator(&stats).await.map_err(MarketError::from_store)?;

        self.record_platform_revenue(
            order.id,
            settlement.amount_cents,
            settlement.platform_fee_cents,
            settlement.net_platform_fee_cents,
            &order.currency,
        )
        .await?;

        self.update_daily_stats(DailyPlatformStats {
            date: settlement.created_at.date_naive(),
            order_count: 1,
            gross_cents: settlement.amount_cents,
            platform_fee_cents: settlement.platform_fee_cents,
            net_fee_cents: settlement.net_platform_fee_cents,
        })
        .await?;

        Ok(())
    }

    /// Append an entry to the platform revenue ledger
    pub async fn record_platform_revenue(
        &self,
        order_id: Uuid,
        amount_cents: i64,
        platform_fee_cents: i64,
        net_platform_fee_cents: i64,
        currency: &str,
    ) -> MarketResult<PlatformRevenue> {
        let entry = PlatformRevenue {
            id: Uuid::new_v4(),
            order_id,
            amount_cents,
            platform_fee_cents,
            net_platform_fee_cents,
            currency: currency.to_string(),
            recorded_at: Utc::now(),
        };
        self.stats
            .append_revenue(&entry)
            .await
            .map_err(MarketError::from_store)?;
        Ok(entry)
    }

    /// Merge a delta into the per-day aggregate
    pub async fn update_daily_stats(
        &self,
        delta: DailyPlatformStats,
    ) -> MarketResult<DailyPlatformStats> {
        self.stats.merge_daily(&delta).await.map_err(MarketError::from_store)
    }

    /// Stat row plus derived rolling windows and ranking
    pub async fn get_creator_analytics(&self, creator_id: Uuid) -> MarketResult<CreatorAnalytics> {
        let stats = self.get_creator_stats(creator_id).await?;

        let now = Utc::now();
        let start_30 = now - Duration::days(ANALYTICS_WINDOW_DAYS);
        let start_7 = now - Duration::days(RECENT_WINDOW_DAYS);

        let window = self
            .orders
            .list_between(start_30, now)
            .await
            .map_err(MarketError::from_store)?;

        let orders_30d = window.iter().filter(|o| o.creator_id == creator_id).count() as u64;

        // Earnings windows count only completed orders, by completion time
        let completed_in = |start: DateTime<Utc>| {
            window.iter().filter(move |o| {
                o.creator_id == creator_id
                    && o.status == OrderStatus::Completed
                    && o.completed_at.map(|t| t >= start).unwrap_or(false)
            })
        };
        let earnings_30d_cents: i64 = completed_in(start_30)
            .map(|o| o.creator_earnings_cents)
            .sum();
        let earnings_7d_cents: i64 = completed_in(start_7)
            .map(|o| o.creator_earnings_cents)
            .sum();

        let mut by_day: HashMap<NaiveDate, i64> = HashMap::new();
        for order in completed_in(start_30) {
            if let Some(done) = order.completed_at {
                *by_day.entry(done.date_naive()).or_default() += order.creator_earnings_cents;
            }
        }
        let mut top_days: Vec<DailyEarnings> = by_day
            .into_iter()
            .map(|(date, earnings_cents)| DailyEarnings {
                date,
                earnings_cents,
            })
            .collect();
        top_days.sort_by(|a, b| b.earnings_cents.cmp(&a.earnings_cents).then(a.date.cmp(&b.date)));
        top_days.truncate(TOP_DAYS);

        // Rank against every other creator active in the window
        let mut per_creator: HashMap<Uuid, i64> = HashMap::new();
        for order in &window {
            let earned = if order.status == OrderStatus::Completed {
                order.creator_earnings_cents
            } else {
                0
            };
            *per_creator.entry(order.creator_id).or_default() += earned;
        }
        per_creator.remove(&creator_id);
        let percentile_rank = if per_creator.is_empty() {
            None
        } else {
            let below = per_creator
                .values()
                .filter(|&&earned| earned < earnings_30d_cents)
                .count();
            Some(Decimal::from(below) * dec!(100) / Decimal::from(per_creator.len()))
        };

        Ok(CreatorAnalytics {
            stats,
            orders_30d,
            earnings_30d_cents,
            earnings_7d_cents,
            top_days,
            percentile_rank,
        })
    }

    /// Platform totals over the trailing window, with growth vs the
    /// immediately preceding window of equal length
    pub async fn get_platform_analytics(&self, window_days: i64) -> MarketResult<PlatformAnalytics> {
        if window_days <= 0 {
            return Err(MarketError::validation(
                "window_days",
                "must be a positive number of days",
            ));
        }

        let end = Utc::now();
        let start = end - Duration::days(window_days);
        let prev_start = start - Duration::days(window_days);

        let current_revenue = self
            .stats
            .revenue_between(start, end)
            .await
            .map_err(MarketError::from_store)?;
        let previous_revenue = self
            .stats
            .revenue_between(prev_start, start)
            .await
            .map_err(MarketError::from_store)?;

        let net: i64 = current_revenue
            .iter()
            .map(|r| r.net_platform_fee_cents)
            .sum();
        let prev_net: i64 = previous_revenue
            .iter()
            .map(|r| r.net_platform_fee_cents)
            .sum();

        let current_orders = self
            .orders
            .list_between(start, end)
            .await
            .map_err(MarketError::from_store)?;
        let previous_orders = self
            .orders
            .list_between(prev_start, start)
            .await
            .map_err(MarketError::from_store)?;

        let creators: HashSet<Uuid> = current_orders.iter().map(|o| o.creator_id).collect();
        let fans: HashSet<Uuid> = current_orders.iter().map(|o| o.fan_id).collect();

        Ok(PlatformAnalytics {
            window_days,
            net_revenue_cents: net,
            order_count: current_orders.len() as u64,
            active_creators: creators.len() as u64,
            active_fans: fans.len() as u64,
            revenue_growth_pct: pct_growth(net, prev_net),
            order_growth_pct: pct_growth(
                current_orders.len() as i64,
                previous_orders.len() as i64,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metadata, PaymentRecordStatus, DEFAULT_CURRENCY};
    use crate::store::{InMemoryOrderStore, InMemoryStatsStore};

    fn aggregator() -> (StatsAggregator, Arc<InMemoryOrderStore>, Arc<InMemoryStatsStore>) {
        let orders = Arc::new(InMemoryOrderStore::new());
        let stats = Arc::new(InMemoryStatsStore::new());
        (
            StatsAggregator::new(stats.clone(), orders.clone()),
            orders,
            stats,
        )
    }

    fn completed_order(creator_id: Uuid, earnings: i64, days_ago: i64) -> Order {
        let when = Utc::now() - Duration::days(days_ago);
        let amount = earnings * 10 / 7; // roughly invert the split for test data
        Order {
            id: Uuid::new_v4(),
            fan_id: Uuid::new_v4(),
            creator_id,
            request_id: Uuid::new_v4(),
            payment_intent_id: format!("pi_{}", Uuid::new_v4().simple()),
            amount_cents: amount,
            currency: DEFAULT_CURRENCY.into(),
            platform_fee_cents: amount - earnings,
            creator_earnings_cents: earnings,
            status: OrderStatus::Completed,
            created_at: when,
            accepted_at: Some(when),
            completed_at: Some(when),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_stats_created_on_first_read() {
        let (agg, _orders, stats) = aggregator();
        let creator = Uuid::new_v4();

        assert!(stats.get_creator(creator).await.unwrap().is_none());
        let row = agg.get_creator_stats(creator).await.unwrap();
        assert_eq!(row.total_orders, 0);

        // The zeroed row persisted
        assert!(stats.get_creator(creator).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_administrative_patch() {
        let (agg, _orders, _stats) = aggregator();
        let creator = Uuid::new_v4();

        let updated = agg
            .update_creator_stats(
                creator,
                CreatorStatsPatch {
                    completed_orders: Some(12),
                    total_earnings_cents: Some(84_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.completed_orders, 12);
        assert_eq!(updated.total_earnings_cents, 84_000);
        assert_eq!(updated.rejected_orders, 0);
    }

    #[tokio::test]
    async fn test_completed_trigger_feeds_ledgers() {
        let (agg, _orders, stats) = aggregator();
        let creator = Uuid::new_v4();
        let order = completed_order(creator, 7_000, 0);
        let settlement = Payment {
            id: Uuid::new_v4(),
            order_id: order.id,
            processor_payment_id: order.payment_intent_id.clone(),
            amount_cents: order.amount_cents,
            platform_fee_cents: order.platform_fee_cents,
            creator_earnings_cents: order.creator_earnings_cents,
            processor_fee_cents: Some(300),
            net_platform_fee_cents: order.platform_fee_cents - 300,
            status: PaymentRecordStatus::Settled,
            created_at: Utc::now(),
        };

        agg.record_order_completed(&order, &settlement).await.unwrap();

        let row = agg.get_creator_stats(creator).await.unwrap();
        assert_eq!(row.completed_orders, 1);
        assert_eq!(row.total_earnings_cents, 7_000);

        let daily = stats
            .get_daily(settlement.created_at.date_naive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(daily.order_count, 1);
        assert_eq!(daily.net_fee_cents, settlement.net_platform_fee_cents);

        let window = stats
            .revenue_between(Utc::now() - Duration::days(1), Utc::now() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].order_id, order.id);
    }

    #[tokio::test]
    async fn test_creator_analytics_windows_and_top_days() {
        let (agg, orders, _stats) = aggregator();
        let creator = Uuid::new_v4();

        // Two recent days and one outside the 7-day window
        orders.insert(&completed_order(creator, 7_000, 1)).await.unwrap();
        orders.insert(&completed_order(creator, 3_500, 2)).await.unwrap();
        orders.insert(&completed_order(creator, 1_400, 10)).await.unwrap();
        // A different creator, inside the window
        orders
            .insert(&completed_order(Uuid::new_v4(), 700, 1))
            .await
            .unwrap();

        let analytics = agg.get_creator_analytics(creator).await.unwrap();
        assert_eq!(analytics.orders_30d, 3);
        assert_eq!(analytics.earnings_30d_cents, 11_900);
        assert_eq!(analytics.earnings_7d_cents, 10_500);
        assert_eq!(analytics.top_days.len(), 3);
        assert_eq!(analytics.top_days[0].earnings_cents, 7_000);

        // The only other creator earned less
        assert_eq!(analytics.percentile_rank, Some(dec!(100)));
    }

    #[tokio::test]
    async fn test_percentile_absent_without_peers() {
        let (agg, orders, _stats) = aggregator();
        let creator = Uuid::new_v4();
        orders.insert(&completed_order(creator, 7_000, 1)).await.unwrap();

        let analytics = agg.get_creator_analytics(creator).await.unwrap();
        assert!(analytics.percentile_rank.is_none());
    }

    #[tokio::test]
    async fn test_platform_growth_zero_when_prior_window_empty() {
        let (agg, orders, _stats) = aggregator();
        let creator = Uuid::new_v4();
        let order = completed_order(creator, 7_000, 1);
        orders.insert(&order).await.unwrap();
        agg.record_platform_revenue(order.id, 10_000, 3_000, 2_700, DEFAULT_CURRENCY)
            .await
            .unwrap();

        let analytics = agg.get_platform_analytics(30).await.unwrap();
        assert_eq!(analytics.net_revenue_cents, 2_700);
        assert_eq!(analytics.order_count, 1);
        assert_eq!(analytics.active_creators, 1);
        assert_eq!(analytics.active_fans, 1);
        // No revenue in the prior window: growth is 0, not a division error
        assert_eq!(analytics.revenue_growth_pct, dec!(0));
        assert_eq!(analytics.order_growth_pct, dec!(0));
    }

    #[tokio::test]
    async fn test_platform_analytics_rejects_bad_window() {
        let (agg, _orders, _stats) = aggregator();
        assert!(agg.get_platform_analytics(0).await.is_err());
        assert!(agg.get_platform_analytics(-7).await.is_err());
    }
}
