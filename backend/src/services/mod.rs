//! Business logic services for the ChemTrade CRM/PMS platform

pub mod crm;
pub mod pipeline;
pub mod pms;
pub mod profile_worker;
pub mod stock;

pub use crm::CrmService;
pub use pipeline::PipelineService;
pub use pms::PmsService;
pub use profile_worker::ProfileWorker;
pub use stock::StockService;
