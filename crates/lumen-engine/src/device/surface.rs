use super::FeatureLevel;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface must be reconfigured; rendering may resume next frame.
    Reconfigure,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate.
    Fatal,
}

/// Picks the first level in `levels` whose features `supported` covers.
pub fn negotiate_feature_level(
    levels: &[FeatureLevel],
    supported: wgpu::Features,
) -> Option<&FeatureLevel> {
    levels.iter().find(|level| supported.contains(level.features))
}

/// Picks a surface format the compute stage can write through a storage view.
///
/// sRGB formats are never storage-capable, and BGRA storage needs
/// `BGRA8UNORM_STORAGE` on the device.
pub fn choose_storage_format(
    formats: &[wgpu::TextureFormat],
    features: wgpu::Features,
) -> Option<wgpu::TextureFormat> {
    let preferred = [
        wgpu::TextureFormat::Rgba8Unorm,
        wgpu::TextureFormat::Bgra8Unorm,
        wgpu::TextureFormat::Rgba16Float,
    ];

    preferred.into_iter().find(|f| {
        let allowed = *f != wgpu::TextureFormat::Bgra8Unorm
            || features.contains(wgpu::Features::BGRA8UNORM_STORAGE);
        allowed && formats.contains(f)
    })
}

/// Maps the vsync setting onto a present mode the surface supports.
pub fn choose_present_mode(modes: &[wgpu::PresentMode], wait_for_vsync: bool) -> wgpu::PresentMode {
    if wait_for_vsync {
        return wgpu::PresentMode::Fifo;
    }

    [wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(wgpu::PresentMode::Fifo)
}

pub(crate) fn choose_alpha_mode(caps: &wgpu::SurfaceCapabilities) -> wgpu::CompositeAlphaMode {
    caps.alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

pub(crate) fn map_surface_error(err: &wgpu::SurfaceError) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceErrorAction::Reconfigure,
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
        wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}
