//! Puzzle 8: memorise numbered symbols and their colours, then reproduce them
//! box by box over three rounds.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::delta::{Delta, as_whole_number, js_number, truthy};
use crate::engine::{Effects, Flow, Screen};
use crate::render::Node;

pub const TOTAL_ROUNDS: i64 = 3;
pub const COLOR_PREFIX: &str = "p8-color-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolsTargets {
    pub grid: String,
    pub streak: String,
}

impl Default for SymbolsTargets {
    fn default() -> Self {
        Self {
            grid: "#p8-grid".to_string(),
            streak: "#streak".to_string(),
        }
    }
}

impl SymbolsTargets {
    fn all_slots(&self) -> String {
        format!("{} .p8-slot", self.grid)
    }

    fn slot(&self, index: usize) -> String {
        format!(r#"{} .p8-slot[data-index="{index}"]"#, self.grid)
    }

    fn all_frames(&self) -> String {
        format!("{} .p8-frame", self.grid)
    }

    fn frame(&self, index: usize) -> String {
        format!(
            r#"{} .p8-frame:has(> .p8-slot[data-index="{index}"])"#,
            self.grid
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Mark {
    symbol: String,
    color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Number(String),
    Marks(Vec<Mark>),
}

#[derive(Debug, Default)]
pub struct Symbols {
    targets: SymbolsTargets,
    round: Option<i64>,
    order: Vec<String>,
    slots: BTreeMap<usize, Slot>,
}

fn symbol_node(mark: &Mark) -> Node {
    let mut node = Node::div()
        .class(&format!("p8-symbol-mask p8-{}", mark.symbol))
        .attr("data-symbol", mark.symbol.clone())
        .attr("aria-label", mark.symbol.clone());
    if let Some(color) = &mark.color {
        node = node.class(&format!("{COLOR_PREFIX}{color}"));
    }
    node
}

fn box_index(key: &str) -> Option<usize> {
    key.parse().ok()
}

fn string_list(value: &Value) -> Vec<Option<String>> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::Null => None,
                    Value::String(s) if s.is_empty() => None,
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.as_f64().map_or_else(|| n.to_string(), js_number)),
                    other => Some(other.to_string()),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl Symbols {
    #[must_use]
    pub fn new(targets: SymbolsTargets) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }

    /// Symbols a slot can hold in the current round.
    #[must_use]
    pub fn slot_capacity(&self) -> usize {
        self.round
            .map_or(3, |round| usize::try_from(round.clamp(1, TOTAL_ROUNDS)).unwrap_or(3))
    }

    fn render_slot(&self, fx: &mut Effects<'_>, index: usize) {
        let selector = self.targets.slot(index);
        let (children, count) = match self.slots.get(&index) {
            Some(Slot::Number(n)) => (vec![Node::div().class("p8-number").text(n.clone())], 1),
            Some(Slot::Marks(marks)) => (marks.iter().map(symbol_node).collect(), marks.len()),
            None => (Vec::new(), 0),
        };
        let surface = fx.surface();
        surface.replace_children(&selector, &children);
        surface.set_class(&selector, "p8-duo", count >= 2);
        surface.set_class(&selector, "p8-trio", count >= 3);
    }

    fn clear_grid(&mut self, fx: &mut Effects<'_>) {
        self.slots.clear();
        let slots = self.targets.all_slots();
        let frames = self.targets.all_frames();
        let surface = fx.surface();
        surface.replace_children(&slots, &[]);
        surface.set_class(&slots, "p8-duo", false);
        surface.set_class(&slots, "p8-trio", false);
        surface.set_class(&frames, "p8-correct", false);
        surface.set_class(&frames, "p8-wrong", false);
    }

    fn render_row(&mut self, fx: &mut Effects<'_>, items: Vec<Option<String>>, numbers: bool) {
        if items.is_empty() {
            return;
        }
        let slots = self.targets.all_slots();
        fx.surface().replace_children(&slots, &[]);
        self.slots.clear();
        for (index, item) in items.into_iter().enumerate() {
            let Some(item) = item else {
                continue;
            };
            let slot = if numbers {
                Slot::Number(item)
            } else {
                Slot::Marks(vec![Mark {
                    symbol: item,
                    color: None,
                }])
            };
            self.slots.insert(index, slot);
            self.render_slot(fx, index);
        }
    }

    fn apply_color_map(&mut self, fx: &mut Effects<'_>, colors: &Map<String, Value>) {
        for (symbol, color) in colors {
            let Some(color) = color.as_str().filter(|c| !c.is_empty()) else {
                continue;
            };
            let found = self.slots.iter_mut().find_map(|(index, slot)| match slot {
                Slot::Marks(marks) => marks
                    .iter_mut()
                    .find(|m| m.symbol == *symbol)
                    .map(|mark| (*index, mark)),
                Slot::Number(_) => None,
            });
            if let Some((index, mark)) = found {
                mark.color = Some(color.to_string());
                self.render_slot(fx, index);
            }
        }
    }

    fn color_box(&mut self, fx: &mut Effects<'_>, index: usize, color: &str, symbol: Option<&str>) {
        let capacity = self.slot_capacity();
        let fallback = self.order.get(index).cloned();
        let slot = self
            .slots
            .entry(index)
            .or_insert_with(|| Slot::Marks(Vec::new()));
        if matches!(slot, Slot::Number(_)) {
            *slot = Slot::Marks(Vec::new());
        }
        let Slot::Marks(marks) = slot else {
            return;
        };
        let color = Some(color.to_string());
        if marks.is_empty() {
            let Some(symbol) = symbol.map(str::to_string).or(fallback) else {
                return;
            };
            marks.push(Mark { symbol, color });
        } else if let Some(symbol) = symbol.filter(|_| marks.len() < capacity) {
            marks.push(Mark {
                symbol: symbol.to_string(),
                color,
            });
        } else if let Some(last) = marks.last_mut() {
            // Re-delivered inputs recolour the newest mark instead of stacking.
            last.color = color;
        }
        self.render_slot(fx, index);
    }

    fn hydrate_inputs(&mut self, fx: &mut Effects<'_>, delta: &Delta) {
        let Some(colors) = delta.object_field("input_colors") else {
            return;
        };
        let symbols = delta.object_field("input_symbols");
        for (key, color) in colors {
            let (Some(index), Some(color)) = (box_index(key), color.as_str()) else {
                continue;
            };
            match symbols {
                Some(symbols) => {
                    if let Some(symbol) = symbols.get(key).and_then(Value::as_str) {
                        self.color_box(fx, index, color, Some(symbol));
                    }
                }
                None => self.color_box(fx, index, color, None),
            }
        }
    }

    fn show_results(&self, fx: &mut Effects<'_>, results: &Map<String, Value>) {
        for (key, ok) in results {
            let Some(index) = box_index(key) else {
                continue;
            };
            let frame = self.targets.frame(index);
            let ok = truthy(ok);
            let surface = fx.surface();
            surface.set_class(&frame, "p8-correct", ok);
            surface.set_class(&frame, "p8-wrong", !ok);
        }
    }
}

impl Screen for Symbols {
    const PUZZLE_ID: u8 = 8;
    const PRECEDENCE: &'static [&'static str] = &[
        "round",
        "clear",
        "token_numbers",
        "symbols",
        "colors",
        "input_update",
        "input_result",
    ];

    fn apply_field(
        &mut self,
        field: &str,
        value: &Value,
        delta: &Delta,
        fx: &mut Effects<'_>,
    ) -> Flow {
        let phase = delta.str_field("phase");
        match field {
            "round" => {
                if let Some(round) = value.as_i64().filter(|r| *r >= 1) {
                    self.round = Some(round);
                    fx.surface()
                        .set_text(&self.targets.streak, &format!("{round}/{TOTAL_ROUNDS}"));
                }
            }
            "clear" if truthy(value) => self.clear_grid(fx),
            "token_numbers" if value.is_array() => {
                self.render_row(fx, string_list(value), true);
                return Flow::Stop;
            }
            "symbols" if value.is_array() => match phase {
                Some("tokens") => {
                    self.order = string_list(value).into_iter().flatten().collect();
                    self.render_row(fx, string_list(value), false);
                }
                Some("input") => {
                    self.order = string_list(value).into_iter().flatten().collect();
                    self.hydrate_inputs(fx, delta);
                    return Flow::Stop;
                }
                _ => {}
            },
            "colors" if phase == Some("tokens") && truthy(value) => {
                if let Some(colors) = value.as_object() {
                    self.apply_color_map(fx, colors);
                }
                return Flow::Stop;
            }
            "input_update" if phase == Some("input") && truthy(value) => {
                let index = value
                    .get("box")
                    .and_then(as_whole_number)
                    .and_then(|b| usize::try_from(b).ok());
                let color = value.get("color").and_then(Value::as_str);
                if let (Some(index), Some(color)) = (index, color) {
                    let symbol = value.get("symbol").and_then(Value::as_str);
                    self.color_box(fx, index, color, symbol);
                }
                return Flow::Stop;
            }
            "input_result" => {
                if let Some(results) = value.get("box_results").and_then(Value::as_object) {
                    self.show_results(fx, results);
                    return Flow::Stop;
                }
            }
            _ => {}
        }
        Flow::Continue
    }
}
