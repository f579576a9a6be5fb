pub mod alignment;
pub mod device;
pub mod writer;

#[cfg(test)]
pub(crate) mod mock;
