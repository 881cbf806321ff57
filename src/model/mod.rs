pub mod binary;
pub mod card;
pub mod custom_field;
pub mod params;
pub mod reference;
pub mod webhook;

pub use binary::BinaryData;
pub use card::{CardRecord, Projection};
pub use custom_field::{CustomFieldMapping, CustomFieldSchema, FieldKind};
pub use params::{InputItem, ItemParams};
pub use reference::Reference;
pub use webhook::{WebhookRegistration, WebhookSubscription};
