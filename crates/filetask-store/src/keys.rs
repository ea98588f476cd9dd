use filetask_core::TaskId;

pub const TASK_KEY_PREFIX: &str = "task:";

pub fn task_key(id: &TaskId) -> String {
    format!("{}{}", TASK_KEY_PREFIX, id)
}
