mod actions;
mod page;
mod wait;

pub use page::ChromiumPage;
