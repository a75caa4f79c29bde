pub mod bootstrap;
pub mod card_browser;
pub mod controller;
pub mod controls;
pub mod error;
pub mod fragments;
mod markup;
pub mod mutation_client;

pub use bootstrap::PageBootstrap;
pub use card_browser::{CardBrowser, CardPager, CardSource, CardsResponse, FeedSelector};
pub use controller::{
    ActionOutcome, FailureKind, InputKind, NoopReason, PanelController, PanelEvent, PanelSnapshot,
    PanelState,
};
pub use controls::{Control, ControlStates, PendingFlags};
pub use error::PanelError;
pub use fragments::{FragmentSlot, PanelDocument, SelectorBinding};
pub use mutation_client::{AntiForgeryToken, BulkFile, FragmentSource, HttpPanelApi, PanelApi};
