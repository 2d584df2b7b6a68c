// 聊天群组文档存储
// 群组文档与行程一一对应，生命周期由 coordinator 跟随行程变更驱动

pub mod coordinator;
pub mod keys;
pub mod models;
pub mod operations;

pub use coordinator::GroupLifecycle;
pub use models::ChatGroupDoc;
pub use operations::ChatGroupOperations;
