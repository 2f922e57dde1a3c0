use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown attachment '{attachment}' for slot '{slot}'")]
    UnknownAttachment { slot: String, attachment: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[cfg(feature = "json")]
    #[error("failed to parse skeleton JSON: {message}")]
    JsonParse { message: String },

    #[cfg(feature = "json")]
    #[error("invalid color '{value}' for {context}")]
    JsonInvalidColor { context: String, value: String },

    #[cfg(feature = "json")]
    #[error("unknown parent bone '{parent}' for bone '{bone}'")]
    JsonUnknownBoneParent { bone: String, parent: String },

    #[cfg(feature = "json")]
    #[error("unknown bone '{bone}' referenced by slot '{slot}'")]
    JsonUnknownSlotBone { slot: String, bone: String },

    #[cfg(feature = "json")]
    #[error("unknown bone '{bone}' referenced by constraint '{constraint}'")]
    JsonUnknownConstraintBone { constraint: String, bone: String },

    #[cfg(feature = "json")]
    #[error("unknown slot '{slot}' referenced by skin '{skin}'")]
    JsonUnknownSkinSlot { skin: String, slot: String },

    #[cfg(feature = "json")]
    #[error("unknown bone '{bone}' referenced by skin '{skin}'")]
    JsonUnknownSkinBone { skin: String, bone: String },

    #[cfg(feature = "json")]
    #[error("unknown {kind} constraint '{constraint}' referenced by skin '{skin}'")]
    JsonUnknownSkinConstraint {
        skin: String,
        kind: String,
        constraint: String,
    },

    #[cfg(feature = "json")]
    #[error(
        "unsupported attachment type '{attachment_type}' for skin '{skin}', slot '{slot}', attachment '{attachment}'"
    )]
    JsonUnsupportedAttachmentType {
        skin: String,
        slot: String,
        attachment: String,
        attachment_type: String,
    },

    #[cfg(feature = "json")]
    #[error(
        "unsupported weighted vertices for skin '{skin}', slot '{slot}', attachment '{attachment}'"
    )]
    JsonUnsupportedWeightedVertices {
        skin: String,
        slot: String,
        attachment: String,
    },

    #[cfg(feature = "json")]
    #[error(
        "invalid mesh data for skin '{skin}', slot '{slot}', attachment '{attachment}': {message}"
    )]
    JsonInvalidMeshData {
        skin: String,
        slot: String,
        attachment: String,
        message: String,
    },

    #[cfg(feature = "json")]
    #[error(
        "unknown parent mesh '{parent}' for linked mesh '{attachment}' (skin '{skin}', slot '{slot}')"
    )]
    JsonUnknownLinkedMeshParent {
        skin: String,
        slot: String,
        attachment: String,
        parent: String,
    },

    #[cfg(feature = "json")]
    #[error("unknown end slot '{slot}' for clipping attachment '{attachment}'")]
    JsonUnknownClippingEndSlot { attachment: String, slot: String },
}
