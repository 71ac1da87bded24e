mod common;
mod places;
mod watcher;
