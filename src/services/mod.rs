pub mod confirmation_service;
pub mod ingest_service;
pub mod subscription_service;
