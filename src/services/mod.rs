pub mod finder;
pub mod monitor;
pub mod seeder;
pub mod synchronizer;
pub mod validator;

pub use finder::Finder;
pub use monitor::Monitor;
pub use seeder::Seeder;
pub use synchronizer::Synchronizer;
pub use validator::Validator;
