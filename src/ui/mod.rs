pub mod actions;
pub mod events;
pub mod grid;
pub mod keybindings;
pub mod selection;

pub use actions::{Action, ActionDispatcher, ExternalActions, NoExternalActions};
pub use events::{EventBus, GridEvent};
pub use grid::{human_size, LoadDisposition, ThumbnailGrid};
pub use keybindings::{
    default_bindings, BindingTable, Direction, Input, Key, Modifiers, PointerButton,
};
pub use selection::{SelectFilter, SelectionController};
