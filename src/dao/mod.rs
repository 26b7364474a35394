/// Race engine client.
pub mod engine;
/// Persisted operator preferences.
pub mod preferences;
/// Storage error types shared by preference stores.
pub mod storage;
