pub mod actions;
pub mod consts;
pub mod expression;
pub mod template;
