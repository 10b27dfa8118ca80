pub mod global;
pub mod link_list;
pub mod pack;
