//! Extraction and rewriting of artifact references inside a view state.
//!
//! Workspace sharing needs every region, expression, RGB mix and
//! quantification a view state points at: private ones are auto-shared
//! and their references rewritten to the shared ids.

use regolith_common::models::expression::{BUILTIN_EXPR_PREFIX, RGB_MIX_ID_PREFIX};
use regolith_common::models::roi::is_predefined_roi;
use regolith_common::models::WholeViewState;
use regolith_common::ItemId;
use std::collections::{BTreeSet, HashMap};

/// Artifact ids referenced by a view state, partitioned by kind.
/// Ids are carried in their wire form, including kind prefixes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReferencedIds {
    pub rois: BTreeSet<String>,
    pub expressions: BTreeSet<String>,
    pub rgb_mixes: BTreeSet<String>,
    pub quants: BTreeSet<String>,
}

impl ReferencedIds {
    fn add_roi(&mut self, id: &str) {
        if !id.is_empty() && !is_predefined_roi(id) {
            self.rois.insert(id.to_string());
        }
    }

    /// Expression slots can hold RGB mix ids; built-ins are never stored
    fn add_expression(&mut self, id: &str) {
        if id.is_empty() || id.starts_with(BUILTIN_EXPR_PREFIX) {
            return;
        }
        if id.starts_with(RGB_MIX_ID_PREFIX) {
            self.rgb_mixes.insert(id.to_string());
        } else {
            self.expressions.insert(id.to_string());
        }
    }

    fn add_quant(&mut self, id: &str) {
        if !id.is_empty() {
            self.quants.insert(id.to_string());
        }
    }

    /// Ids still living in a private namespace, across all kinds
    pub fn non_shared(&self) -> Vec<String> {
        self.rois
            .iter()
            .chain(&self.expressions)
            .chain(&self.rgb_mixes)
            .chain(&self.quants)
            .filter(|id| !ItemId::parse(id).is_shared())
            .cloned()
            .collect()
    }
}

/// Walk every widget kind that can hold artifact references
pub fn collect_references(state: &WholeViewState) -> ReferencedIds {
    let mut refs = ReferencedIds::default();

    for ctx in state.context_images.values() {
        for layer in &ctx.roi_layers {
            refs.add_roi(&layer.roi_id);
        }
        for layer in &ctx.map_layers {
            refs.add_expression(&layer.expression_id);
        }
    }
    for hist in state.histograms.values() {
        for roi in &hist.visible_rois {
            refs.add_roi(roi);
        }
        for expr in &hist.expression_ids {
            refs.add_expression(expr);
        }
    }
    for chord in state.chord_diagrams.values() {
        refs.add_roi(&chord.display_roi);
        for expr in &chord.expression_ids {
            refs.add_expression(expr);
        }
    }
    for plot in state
        .ternary_plots
        .values()
        .chain(state.binary_plots.values())
        .chain(state.variograms.values())
    {
        for roi in &plot.visible_rois {
            refs.add_roi(roi);
        }
        for expr in &plot.expression_ids {
            refs.add_expression(expr);
        }
    }
    for table in state.tables.values() {
        for roi in &table.visible_rois {
            refs.add_roi(roi);
        }
    }
    for table in state.roi_quant_tables.values() {
        refs.add_roi(&table.roi);
        for quant in &table.quant_ids {
            refs.add_quant(quant);
        }
    }
    for spectrum in state.spectrums.values() {
        for line in &spectrum.spectrum_lines {
            refs.add_roi(&line.roi_id);
        }
    }
    refs.add_quant(&state.quantification.applied_quant_id);

    refs
}

/// Rewrite every reference present in the replacement map
pub fn replace_references(state: &mut WholeViewState, replacements: &HashMap<String, String>) {
    let swap = |id: &mut String| {
        if let Some(new_id) = replacements.get(id.as_str()) {
            *id = new_id.clone();
        }
    };
    let swap_all = |ids: &mut Vec<String>| {
        for id in ids.iter_mut() {
            if let Some(new_id) = replacements.get(id.as_str()) {
                *id = new_id.clone();
            }
        }
    };

    for ctx in state.context_images.values_mut() {
        for layer in ctx.roi_layers.iter_mut() {
            swap(&mut layer.roi_id);
        }
        for layer in ctx.map_layers.iter_mut() {
            swap(&mut layer.expression_id);
        }
    }
    for hist in state.histograms.values_mut() {
        swap_all(&mut hist.visible_rois);
        swap_all(&mut hist.expression_ids);
    }
    for chord in state.chord_diagrams.values_mut() {
        swap(&mut chord.display_roi);
        swap_all(&mut chord.expression_ids);
    }
    for plot in state
        .ternary_plots
        .values_mut()
        .chain(state.binary_plots.values_mut())
        .chain(state.variograms.values_mut())
    {
        swap_all(&mut plot.visible_rois);
        swap_all(&mut plot.expression_ids);
    }
    for table in state.tables.values_mut() {
        swap_all(&mut table.visible_rois);
    }
    for table in state.roi_quant_tables.values_mut() {
        swap(&mut table.roi);
        swap_all(&mut table.quant_ids);
    }
    for spectrum in state.spectrums.values_mut() {
        for line in spectrum.spectrum_lines.iter_mut() {
            swap(&mut line.roi_id);
        }
    }
    swap(&mut state.quantification.applied_quant_id);
}
