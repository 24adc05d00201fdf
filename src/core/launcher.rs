use crate::core::cmd::run_checked;
use anyhow::Result;
use std::time::Duration;

const ANDROID_MAPS: &str =
    "intent://maps.google.com/#Intent;scheme=https;package=com.google.android.apps.maps;end";
const IOS_MAPS: &str = "maps://";
const WEB_MAPS: &str = "https://www.google.com/maps";

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
    Other,
}

impl Platform {
    pub fn from_user_agent(ua: &str) -> Self {
        let ua = ua.to_lowercase();
        if ua.contains("android") {
            Self::Android
        } else if ua.contains("iphone") || ua.contains("ipad") {
            Self::Ios
        } else {
            Self::Other
        }
    }

    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else {
            Self::Other
        }
    }

    pub fn maps_target(&self) -> &'static str {
        match self {
            Self::Android => ANDROID_MAPS,
            Self::Ios => IOS_MAPS,
            Self::Other => WEB_MAPS,
        }
    }

    /// Program and arguments that hand the target to the system.
    fn opener(&self) -> (&'static str, Vec<&'static str>) {
        match self {
            // am parses `intent:` URIs directly.
            Self::Android => ("/system/bin/am", vec!["start", self.maps_target()]),
            Self::Ios => ("open", vec![self.maps_target()]),
            Self::Other if cfg!(target_os = "macos") => ("open", vec![self.maps_target()]),
            Self::Other => ("xdg-open", vec![self.maps_target()]),
        }
    }
}

pub async fn launch_maps(platform: Platform) -> Result<()> {
    let (program, args) = platform.opener();
    tracing::debug!(target: "wakewatch::ctl", "Launching {} {:?}", program, args);
    run_checked(program, &args, LAUNCH_TIMEOUT).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_branches() {
        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36";
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        let ipad = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X)";
        let desktop = "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0";

        assert_eq!(Platform::from_user_agent(android), Platform::Android);
        assert_eq!(Platform::from_user_agent(iphone), Platform::Ios);
        assert_eq!(Platform::from_user_agent(ipad), Platform::Ios);
        assert_eq!(Platform::from_user_agent(desktop), Platform::Other);
    }

    #[test]
    fn test_targets() {
        assert!(Platform::Android.maps_target().starts_with("intent://"));
        assert_eq!(Platform::Ios.maps_target(), "maps://");
        assert_eq!(Platform::Other.maps_target(), "https://www.google.com/maps");
    }

    #[test]
    fn test_android_opener_uses_am() {
        let (program, args) = Platform::Android.opener();
        assert_eq!(program, "/system/bin/am");
        assert_eq!(args, vec!["start", ANDROID_MAPS]);
    }
}
