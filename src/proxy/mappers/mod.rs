// Request shapes and tolerant parsing of model output

#[cfg(test)]
pub mod chat;
pub mod json_extract;
pub mod menu;
pub mod request;
pub mod whitelist;
