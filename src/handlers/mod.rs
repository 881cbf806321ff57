pub mod attachments;
pub mod boards;
pub mod cards;
pub mod labels;
pub mod main_card;
pub mod workspaces;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{NodeError, Result};
use crate::model::binary::BinaryData;
use crate::model::params::ItemParams;
use crate::transport::Transport;

/// Declares an operation enum together with its wire names.
macro_rules! operations {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

operations!(MainCardOp {
    Create => "create",
    Update => "update",
    Move => "move",
    Get => "get",
    GetCustom => "getCustom",
    GetAllCardsPerBoard => "getAllCardsPerBoard",
});

operations!(CardOp {
    Link => "link",
    Unlink => "unlink",
    SetCustomFields => "setCustomFields",
    Block => "block",
    Unblock => "unblock",
    Archive => "archive",
    Unarchive => "unarchive",
    Discard => "discard",
    Restore => "restore",
    Comment => "comment",
    Subtask => "subtask",
    Logtime => "logtime",
});

operations!(AttachmentOp {
    Get => "get",
    Download => "download",
    Upload => "upload",
});

operations!(WorkspaceOp {
    Create => "create",
    Update => "update",
    Get => "get",
    GetAllWorkspaces => "getAllWorkspaces",
});

operations!(BoardOp {
    Create => "create",
    Update => "update",
    Get => "get",
    GetAllBoards => "getAllBoards",
    GetBoardStructure => "getBoardStructure",
});

operations!(TagOp {
    Create => "create",
    Update => "update",
    Delete => "delete",
    Get => "get",
    GetAllTags => "getAllTags",
    Assign => "assign",
});

operations!(StickerOp {
    Create => "create",
    Update => "update",
    Delete => "delete",
    Get => "get",
    GetAllStickers => "getAllStickers",
    Assign => "assign",
});

/// Exactly one handler, selected by resource and operation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceOperation {
    MainCard(MainCardOp),
    Cards(CardOp),
    Attachments(AttachmentOp),
    Workspaces(WorkspaceOp),
    Boards(BoardOp),
    Tags(TagOp),
    Stickers(StickerOp),
}

pub const RESOURCES: [&str; 7] = [
    "mainCard",
    "cards",
    "attachments",
    "workspaces",
    "boards",
    "tags",
    "stickers",
];

impl ResourceOperation {
    pub fn resolve(resource: &str, operation: &str) -> Result<Self> {
        let resolved = match resource {
            "mainCard" => MainCardOp::parse(operation).map(Self::MainCard),
            "cards" => CardOp::parse(operation).map(Self::Cards),
            "attachments" => AttachmentOp::parse(operation).map(Self::Attachments),
            "workspaces" => WorkspaceOp::parse(operation).map(Self::Workspaces),
            "boards" => BoardOp::parse(operation).map(Self::Boards),
            "tags" => TagOp::parse(operation).map(Self::Tags),
            "stickers" => StickerOp::parse(operation).map(Self::Stickers),
            _ => None,
        };
        resolved.ok_or_else(|| NodeError::UnsupportedOperation {
            resource: resource.to_string(),
            operation: operation.to_string(),
        })
    }

    pub fn resource(&self) -> &'static str {
        match self {
            Self::MainCard(_) => "mainCard",
            Self::Cards(_) => "cards",
            Self::Attachments(_) => "attachments",
            Self::Workspaces(_) => "workspaces",
            Self::Boards(_) => "boards",
            Self::Tags(_) => "tags",
            Self::Stickers(_) => "stickers",
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::MainCard(op) => op.as_str(),
            Self::Cards(op) => op.as_str(),
            Self::Attachments(op) => op.as_str(),
            Self::Workspaces(op) => op.as_str(),
            Self::Boards(op) => op.as_str(),
            Self::Tags(op) => op.as_str(),
            Self::Stickers(op) => op.as_str(),
        }
    }

    /// Every dispatchable pair.
    pub fn all() -> Vec<Self> {
        let mut all = Vec::new();
        all.extend(MainCardOp::ALL.iter().copied().map(Self::MainCard));
        all.extend(CardOp::ALL.iter().copied().map(Self::Cards));
        all.extend(AttachmentOp::ALL.iter().copied().map(Self::Attachments));
        all.extend(WorkspaceOp::ALL.iter().copied().map(Self::Workspaces));
        all.extend(BoardOp::ALL.iter().copied().map(Self::Boards));
        all.extend(TagOp::ALL.iter().copied().map(Self::Tags));
        all.extend(StickerOp::ALL.iter().copied().map(Self::Stickers));
        all
    }
}

/// What a handler hands back for one item.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    Json(Value),
    Binary {
        json: Value,
        binary: BTreeMap<String, BinaryData>,
    },
}

pub async fn invoke(
    op: ResourceOperation,
    transport: &dyn Transport,
    params: &ItemParams<'_>,
) -> Result<HandlerOutput> {
    match op {
        ResourceOperation::MainCard(op) => main_card::handle(op, transport, params)
            .await
            .map(HandlerOutput::Json),
        ResourceOperation::Cards(op) => cards::handle(op, transport, params)
            .await
            .map(HandlerOutput::Json),
        ResourceOperation::Attachments(op) => attachments::handle(op, transport, params).await,
        ResourceOperation::Workspaces(op) => workspaces::handle(op, transport, params)
            .await
            .map(HandlerOutput::Json),
        ResourceOperation::Boards(op) => boards::handle(op, transport, params)
            .await
            .map(HandlerOutput::Json),
        ResourceOperation::Tags(op) => labels::handle(labels::TAGS, op.into(), transport, params)
            .await
            .map(HandlerOutput::Json),
        ResourceOperation::Stickers(op) => {
            labels::handle(labels::STICKERS, op.into(), transport, params)
                .await
                .map(HandlerOutput::Json)
        }
    }
}

/// A JSON scalar as it appears in a path or query string.
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
