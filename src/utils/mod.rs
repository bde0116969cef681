pub mod comment_tree;
pub mod flash;
pub mod hash;
pub mod html;
pub mod session;
pub mod slug;
pub mod templates;
pub mod upload;
