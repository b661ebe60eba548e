mod goal_list;
mod todo_list;

pub use goal_list::GoalListView;
pub use todo_list::TodoListView;
