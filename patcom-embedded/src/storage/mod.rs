mod config_store;
mod memory;

pub use config_store::{CONFIG_KEY, ConfigStore, SaveReport};
pub use memory::MemoryStorage;

use alloc::string::String;

/// Non-volatile key/value storage (flash preferences on hardware, a file on the host)
#[allow(async_fn_in_trait)]
pub trait LocalStorage {
    type Error: core::fmt::Debug;

    async fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error>;

    async fn set_item(&mut self, key: &str, value: &str) -> Result<(), Self::Error>;
}
