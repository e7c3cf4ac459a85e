pub mod utils;

mod db;
mod resolver;
