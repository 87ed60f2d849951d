pub mod timezone;
