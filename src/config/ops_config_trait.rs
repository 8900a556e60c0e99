// ==========================================
// Roofline Ops - configuration reader trait
// ==========================================
// Approval thresholds and batch-job limits are configuration, not literals.
// Engines depend on this trait; ConfigManager implements it over config_kv,
// tests implement it with fixed mocks.
// ==========================================

use async_trait::async_trait;

#[async_trait]
pub trait OpsConfigReader: Send + Sync {
    /// Total charge above which a billing record needs approval. Default 5000.
    async fn approval_charge_limit(&self) -> anyhow::Result<f64>;

    /// Markup percent below which a record needs approval. Default 15.
    async fn approval_min_markup_pct(&self) -> anyhow::Result<f64>;

    /// Markup percent above which a record needs approval. Default 100.
    async fn approval_max_markup_pct(&self) -> anyhow::Result<f64>;

    /// Single-line quantity above which a record needs approval. Default 100.
    async fn approval_line_qty_limit(&self) -> anyhow::Result<f64>;

    /// Days between materials leaving the warehouse and the billing deadline.
    /// Default 3.
    async fn billing_deadline_days(&self) -> anyhow::Result<i64>;

    /// Days past the billing deadline after which overdue billing escalates
    /// to critical. Default 7.
    async fn overdue_critical_days(&self) -> anyhow::Result<i64>;

    /// Days past the stage violation limit after which an SLA violation
    /// escalates to critical. Default 7.
    async fn sla_critical_overage_days(&self) -> anyhow::Result<i64>;

    /// Ticket count in one stage that constitutes a bottleneck. Default 3.
    async fn bottleneck_warning_count(&self) -> anyhow::Result<usize>;

    /// Ticket count at which a bottleneck alert escalates to high. Default 5.
    async fn bottleneck_high_count(&self) -> anyhow::Result<usize>;
}
