use tracelens_protocol::ThemeToken;

/// Resolved RGBA color for egui rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ResolvedColor {
    const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_color32(self) -> egui::Color32 {
        egui::Color32::from_rgba_unmultiplied(self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    pub fn visuals(self) -> egui::Visuals {
        match self {
            Self::Dark => egui::Visuals::dark(),
            Self::Light => egui::Visuals::light(),
        }
    }
}

pub fn resolve(token: ThemeToken, mode: ThemeMode) -> egui::Color32 {
    resolve_rgba(token, mode).to_color32()
}

fn resolve_rgba(token: ThemeToken, mode: ThemeMode) -> ResolvedColor {
    bar_color(token).unwrap_or_else(|| match mode {
        ThemeMode::Dark => resolve_dark(token),
        ThemeMode::Light => resolve_light(token),
    })
}

/// Observation bars and markers keep one palette in both modes.
fn bar_color(token: ThemeToken) -> Option<ResolvedColor> {
    use ThemeToken::*;
    let color = match token {
        SpanBar => ResolvedColor::rgb(0x19, 0x76, 0xd2),
        GenerationBar => ResolvedColor::rgb(0x9c, 0x27, 0xb0),
        ToolBar => ResolvedColor::rgb(0xed, 0x6c, 0x02),
        AgentBar => ResolvedColor::rgb(0x2e, 0x7d, 0x32),
        EventBar | UnknownBar => ResolvedColor::rgb(0x75, 0x75, 0x75),
        SystemBar => ResolvedColor::rgb(0x42, 0x42, 0x42),
        ErrorMarker => ResolvedColor::rgb(0xd3, 0x2f, 0x2f),
        WarningMarker => ResolvedColor::rgb(0xff, 0xa0, 0x00),
        DiffAdded => ResolvedColor::rgb(0x4c, 0xaf, 0x50),
        DiffRemoved => ResolvedColor::rgb(0xf4, 0x43, 0x36),
        DiffChanged => ResolvedColor::rgb(0xff, 0x98, 0x00),
        _ => return None,
    };
    Some(color)
}

fn resolve_dark(token: ThemeToken) -> ResolvedColor {
    // Catppuccin Mocha
    use ThemeToken::*;
    match token {
        SelectionStroke => ResolvedColor::rgb(0xcd, 0xd6, 0xf4), // Text
        HoverStroke => ResolvedColor::rgba(0xcd, 0xd6, 0xf4, 160),

        RowHover => ResolvedColor::rgba(0xcd, 0xd6, 0xf4, 18),
        RowSelected => ResolvedColor::rgba(0x89, 0xb4, 0xfa, 40), // Blue
        ExpandIcon => ResolvedColor::rgb(0xa6, 0xad, 0xc8),       // Subtext0

        AxisLine => ResolvedColor::rgb(0x58, 0x5b, 0x70), // Surface2
        AxisText => ResolvedColor::rgb(0xba, 0xc2, 0xde), // Subtext1
        Gridline => ResolvedColor::rgba(0x6c, 0x70, 0x86, 60), // Overlay0

        TextPrimary => ResolvedColor::rgb(0xcd, 0xd6, 0xf4),
        TextSecondary => ResolvedColor::rgb(0xba, 0xc2, 0xde),
        TextMuted => ResolvedColor::rgb(0xa6, 0xad, 0xc8),

        Background => ResolvedColor::rgb(0x11, 0x11, 0x1b), // Crust
        Surface => ResolvedColor::rgb(0x18, 0x18, 0x25),    // Mantle
        Border => ResolvedColor::rgb(0x31, 0x32, 0x44),     // Surface0

        ToolbarBackground => ResolvedColor::rgb(0x18, 0x18, 0x25),
        ToolbarText => ResolvedColor::rgb(0xcd, 0xd6, 0xf4),

        _ => ResolvedColor::rgb(0xcd, 0xd6, 0xf4),
    }
}

fn resolve_light(token: ThemeToken) -> ResolvedColor {
    use ThemeToken::*;
    match token {
        SelectionStroke => ResolvedColor::rgb(0, 0, 0),
        HoverStroke => ResolvedColor::rgb(0x33, 0x33, 0x33),

        RowHover => ResolvedColor::rgba(0, 0, 0, 10),
        RowSelected => ResolvedColor::rgba(66, 135, 245, 40),
        ExpandIcon => ResolvedColor::rgb(0x70, 0x70, 0x70),

        AxisLine => ResolvedColor::rgb(150, 150, 160),
        AxisText => ResolvedColor::rgb(80, 80, 100),
        Gridline => ResolvedColor::rgb(0xe0, 0xe0, 0xe0),

        TextPrimary => ResolvedColor::rgb(20, 20, 30),
        TextSecondary => ResolvedColor::rgb(80, 80, 100),
        TextMuted => ResolvedColor::rgb(100, 100, 110),

        Background => ResolvedColor::rgb(255, 255, 255),
        Surface => ResolvedColor::rgb(245, 245, 248),
        Border => ResolvedColor::rgb(210, 210, 220),

        ToolbarBackground => ResolvedColor::rgb(248, 248, 250),
        ToolbarText => ResolvedColor::rgb(40, 40, 50),

        _ => ResolvedColor::rgb(20, 20, 30),
    }
}
