pub mod deposit;
pub mod props;
