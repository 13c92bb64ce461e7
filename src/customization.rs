//! Customizations
//!
//! Shopper-supplied options that set a line item apart from the bare catalog product. A
//! [`CustomizationRequest`] is what the shopper hands to the cart, possibly still holding a raw
//! image; a [`Customization`] is what the cart stores once any image has been embedded.

use std::{
    fmt::{self, Debug, Formatter},
    num::NonZeroU32,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::images::ImageSource;

/// Longest engraving text accepted, in characters.
pub const MAX_ENGRAVING_CHARS: usize = 100;

/// Errors raised while building a customization request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustomizationError {
    /// The engraving text was empty or whitespace.
    #[error("engraving text must not be empty")]
    EmptyText,

    /// The engraving text is too long (length, limit).
    #[error("engraving text is {0} characters, limit is {1}")]
    TextTooLong(usize, usize),
}

/// Image embedded as a self-contained `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    /// Base64 `data:` URL of the image.
    pub data_url: String,

    /// File name the shopper uploaded.
    pub file_name: String,
}

/// Free-text options shared by every customization kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationOptions {
    /// Selected size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Selected color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Special instructions for the workshop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Stored personalization of a line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomizationKind {
    /// No personalization beyond the options.
    Plain,

    /// Personalized text.
    Engraved {
        /// Text to print or engrave.
        text: String,
    },

    /// Shopper-supplied image, optionally with text.
    Image {
        /// The embedded image.
        image: EmbeddedImage,

        /// Accompanying text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

/// Customization as persisted with a line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customization {
    /// Shared options.
    #[serde(flatten)]
    pub options: CustomizationOptions,

    /// Kind-specific payload.
    #[serde(flatten)]
    pub kind: CustomizationKind,
}

impl Customization {
    /// Returns the embedded image, if any.
    pub fn image(&self) -> Option<&EmbeddedImage> {
        match &self.kind {
            CustomizationKind::Image { image, .. } => Some(image),
            CustomizationKind::Plain | CustomizationKind::Engraved { .. } => None,
        }
    }

    /// Returns the personalized text, if any.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            CustomizationKind::Engraved { text } => Some(text),
            CustomizationKind::Image { text, .. } => text.as_deref(),
            CustomizationKind::Plain => None,
        }
    }

    /// Short human-readable description, used in listings.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();

        if let Some(size) = &self.options.size {
            parts.push(format!("size {size}"));
        }

        if let Some(color) = &self.options.color {
            parts.push(format!("color {color}"));
        }

        if let Some(text) = self.text() {
            parts.push(format!("\"{text}\""));
        }

        if let Some(image) = self.image() {
            parts.push(format!("image {}", image.file_name));
        }

        parts.join(", ")
    }
}

/// Kind of a customization request, before any image is embedded.
pub enum RequestKind {
    /// No personalization beyond the options.
    Plain,

    /// Personalized text, already validated.
    Engraved(String),

    /// Raw image to embed, optionally with validated text.
    Image {
        /// Where the image bytes come from.
        source: Box<dyn ImageSource>,

        /// Accompanying text.
        text: Option<String>,
    },
}

impl Debug for RequestKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("Plain"),
            Self::Engraved(text) => f.debug_tuple("Engraved").field(text).finish(),
            Self::Image { source, text } => f
                .debug_struct("Image")
                .field("file_name", &source.file_name())
                .field("mime_type", &source.mime_type())
                .field("text", text)
                .finish(),
        }
    }
}

/// Customization supplied when adding a product to the cart.
#[derive(Debug)]
pub struct CustomizationRequest {
    quantity: Option<NonZeroU32>,
    options: CustomizationOptions,
    kind: RequestKind,
}

impl CustomizationRequest {
    /// A request with no personalization.
    pub fn plain() -> Self {
        Self {
            quantity: None,
            options: CustomizationOptions::default(),
            kind: RequestKind::Plain,
        }
    }

    /// A request carrying engraving text.
    ///
    /// # Errors
    ///
    /// Returns a [`CustomizationError`] if the text is blank or too long.
    pub fn engraved(text: impl Into<String>) -> Result<Self, CustomizationError> {
        let text: String = text.into();
        let text = validate_text(&text)?;

        Ok(Self {
            kind: RequestKind::Engraved(text),
            ..Self::plain()
        })
    }

    /// A request carrying a raw image.
    pub fn image(source: impl ImageSource + 'static) -> Self {
        Self {
            kind: RequestKind::Image {
                source: Box::new(source),
                text: None,
            },
            ..Self::plain()
        }
    }

    /// Adds text to an image request, or turns any other request into an engraving.
    ///
    /// # Errors
    ///
    /// Returns a [`CustomizationError`] if the text is blank or too long.
    pub fn with_text(self, text: impl Into<String>) -> Result<Self, CustomizationError> {
        let text: String = text.into();
        let text = validate_text(&text)?;

        let kind = match self.kind {
            RequestKind::Image { source, .. } => RequestKind::Image {
                source,
                text: Some(text),
            },
            RequestKind::Plain | RequestKind::Engraved(_) => RequestKind::Engraved(text),
        };

        Ok(Self { kind, ..self })
    }

    /// Sets the requested quantity.
    #[must_use]
    pub fn with_quantity(mut self, quantity: NonZeroU32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Sets the shared options.
    #[must_use]
    pub fn with_options(mut self, options: CustomizationOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the requested quantity, if one was given.
    pub fn quantity(&self) -> Option<NonZeroU32> {
        self.quantity
    }

    /// Returns the request kind.
    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub(crate) fn into_parts(self) -> (Option<NonZeroU32>, CustomizationOptions, RequestKind) {
        (self.quantity, self.options, self.kind)
    }
}

fn validate_text(text: &str) -> Result<String, CustomizationError> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(CustomizationError::EmptyText);
    }

    let chars = trimmed.chars().count();

    if chars > MAX_ENGRAVING_CHARS {
        return Err(CustomizationError::TextTooLong(chars, MAX_ENGRAVING_CHARS));
    }

    Ok(trimmed.to_string())
}
