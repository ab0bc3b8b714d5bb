//! Process-wide font state.
//!
//! Font discovery is slow (every system face gets indexed), so the
//! `FontSystem` and the glyph `SwashCache` are built once by [`init`] and
//! shared by every paragraph.  Consumers check [`is_ready`] or get
//! `TextError::NotReady` from [`with_fonts`]; nothing initialises
//! implicitly on the render path.

use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use cosmic_text::{FontSystem, SwashCache};
use log::{info, warn};
use vellum_core::TextError;

pub struct FontContext {
    pub font_system: FontSystem,
    pub swash_cache: SwashCache,
}

static FONTS: OnceLock<Mutex<FontContext>> = OnceLock::new();

/// Load system fonts. Idempotent; returns whether any face was found.
pub fn init() -> bool {
    let fonts = FONTS.get_or_init(|| {
        let started = Instant::now();
        let font_system = FontSystem::new();
        let faces = font_system.db().faces().count();
        info!("font system ready: {faces} faces in {:?}", started.elapsed());
        if faces == 0 {
            warn!("no system fonts found; text overlays will render empty");
        }
        Mutex::new(FontContext {
            font_system,
            swash_cache: SwashCache::new(),
        })
    });
    face_count_in(fonts) > 0
}

pub fn is_ready() -> bool {
    FONTS.get().is_some()
}

/// Number of font faces, or 0 before [`init`].
pub fn face_count() -> usize {
    FONTS.get().map(face_count_in).unwrap_or(0)
}

fn face_count_in(fonts: &Mutex<FontContext>) -> usize {
    match fonts.lock() {
        Ok(ctx) => ctx.font_system.db().faces().count(),
        Err(_) => 0,
    }
}

/// Run `f` with exclusive access to the font state.
pub fn with_fonts<R>(f: impl FnOnce(&mut FontContext) -> R) -> Result<R, TextError> {
    let fonts = FONTS.get().ok_or(TextError::NotReady)?;
    let mut ctx = fonts
        .lock()
        .map_err(|_| TextError::Render("font state poisoned".into()))?;
    Ok(f(&mut ctx))
}

// ===================================================================
// Tests
// ===================================================================
