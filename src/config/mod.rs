//! Настройки запуска `bcp` и логирования.

pub mod settings;

pub use settings::BcpSettings;
