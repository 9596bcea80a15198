mod common;

mod gateway_retry;
mod token_store;
