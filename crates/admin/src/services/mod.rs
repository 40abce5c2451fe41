//! Business logic services for admin.
//!
//! # Services
//!
//! - `auth` - Email and password authentication, registration
//! - `checkout` - Point-of-sale checkout and voids
//! - `cloudinary` - Cloudinary image uploads
//! - `content` - Cached homepage and branch page content
//! - `image_generation` - Text-to-image proxy client

pub mod auth;
pub mod checkout;
pub mod cloudinary;
pub mod content;
pub mod image_generation;

pub use auth::{AuthError, AuthService};
pub use checkout::{CheckoutError, CheckoutService};
pub use cloudinary::{CloudinaryClient, CloudinaryError, Crop, UploadedImage};
pub use content::{ContentService, ContentServiceError};
pub use image_generation::{
    GeneratedImage, GenerationOptions, ImageGenerationClient, ImageGenerationError,
};
