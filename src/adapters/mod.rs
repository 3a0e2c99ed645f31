// Adapters layer: concrete implementations of the domain ports.

pub mod checkpoint;
pub mod csv_sink;
#[cfg(feature = "activity")]
pub mod mysql_activity;
pub mod woocommerce;

pub use checkpoint::FileCheckpointStore;
pub use csv_sink::CsvSink;
#[cfg(feature = "activity")]
pub use mysql_activity::{window_start, ActivityFilter, MySqlActivitySource};
pub use woocommerce::WooCommerceSource;
