pub mod payvault;
