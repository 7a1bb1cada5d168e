use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    // Observation bars, one per observation type
    SpanBar,
    GenerationBar,
    ToolBar,
    AgentBar,
    EventBar,
    SystemBar,
    UnknownBar,

    // Markers
    ErrorMarker,
    WarningMarker,
    SelectionStroke,
    HoverStroke,

    // Rows
    RowHover,
    RowSelected,
    ExpandIcon,

    // Axis
    AxisLine,
    AxisText,
    Gridline,

    TextPrimary,
    TextSecondary,
    TextMuted,

    Background,
    Surface,
    Border,

    // Toolbar / header
    ToolbarBackground,
    ToolbarText,

    // State diff
    DiffAdded,
    DiffRemoved,
    DiffChanged,
}
