pub mod assembler;
pub mod events;
pub mod merger;
pub mod model;
pub mod planner;
pub mod source;
