use tracing::{
  debug,
  info
};

use crate::env::HostEnv;
use crate::persist::Persistence;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum Theme {
  #[default]
  Light,
  Dark
}

impl Theme {
  pub fn storage_value(
    self
  ) -> &'static str {
    match self {
      | Self::Light => "light",
      | Self::Dark => "dark"
    }
  }

  /// Only the two literal stored values are recognized.
  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw {
      | "light" => Some(Self::Light),
      | "dark" => Some(Self::Dark),
      | _ => None
    }
  }

  pub fn toggled(self) -> Self {
    match self {
      | Self::Light => Self::Dark,
      | Self::Dark => Self::Light
    }
  }

  pub fn resolve(
    stored: Option<Theme>,
    prefers_dark: bool
  ) -> Self {
    match stored {
      | Some(theme) => theme,
      | None if prefers_dark => {
        Self::Dark
      }
      | None => Self::Light
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct ThemeState {
  current: Theme
}

impl ThemeState {
  #[tracing::instrument(skip(
    persistence
  ))]
  pub fn load<E: HostEnv>(
    persistence: &Persistence<E>
  ) -> Self {
    let stored =
      persistence.load_theme();
    let current = Theme::resolve(
      stored,
      persistence.prefers_dark()
    );
    debug!(
      ?stored,
      ?current,
      "resolved initial theme"
    );
    Self {
      current
    }
  }

  pub fn current(&self) -> Theme {
    self.current
  }

  pub fn toggle<E: HostEnv>(
    &mut self,
    persistence: &mut Persistence<E>
  ) -> Theme {
    self.set(
      persistence,
      self.current.toggled()
    )
  }

  pub fn set<E: HostEnv>(
    &mut self,
    persistence: &mut Persistence<E>,
    theme: Theme
  ) -> Theme {
    info!(
      from = ?self.current,
      to = ?theme,
      "theme changed"
    );
    self.current = theme;
    persistence.save_theme(theme);
    theme
  }
}

#[cfg(test)]
mod tests {
  use super::{
    Theme,
    ThemeState
  };
  use crate::env::{
    HostEnv,
    MemoryEnv
  };
  use crate::persist::{
    Persistence,
    THEME_KEY
  };

  #[test]
  fn stored_preference_beats_ambient_signal()
  {
    let persistence = Persistence::new(
      MemoryEnv::new()
        .with_prefers_dark(true)
        .with_entry(THEME_KEY, "light")
    );
    assert_eq!(
      ThemeState::load(&persistence)
        .current(),
      Theme::Light
    );
  }

  #[test]
  fn ambient_signal_then_light_default()
  {
    let dark = Persistence::new(
      MemoryEnv::new()
        .with_prefers_dark(true)
    );
    assert_eq!(
      ThemeState::load(&dark).current(),
      Theme::Dark
    );

    let junk = Persistence::new(
      MemoryEnv::new()
        .with_entry(THEME_KEY, "purple")
    );
    assert_eq!(
      ThemeState::load(&junk).current(),
      Theme::Light
    );
  }

  #[test]
  fn toggle_persists_every_change() {
    let mut persistence =
      Persistence::new(MemoryEnv::new());
    let mut state =
      ThemeState::load(&persistence);

    assert_eq!(
      state.toggle(&mut persistence),
      Theme::Dark
    );
    assert_eq!(
      persistence
        .env()
        .get(THEME_KEY)
        .as_deref(),
      Some("dark")
    );

    assert_eq!(
      state.toggle(&mut persistence),
      Theme::Light
    );
    assert_eq!(
      persistence.load_theme(),
      Some(Theme::Light)
    );
  }
}
