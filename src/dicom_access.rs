use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::mem::InMemElement;
use dicom::object::{DefaultDicomObject, InMemDicomObject};

/// Small helper trait to pull typed values from different DICOM object shapes.
pub trait ElementAccess {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn element_floats(&self, tag: Tag) -> Option<Vec<f64>>;
    fn element_int(&self, tag: Tag) -> Option<i32>;
    fn has_element(&self, tag: Tag) -> bool;

    fn element_float(&self, tag: Tag) -> Option<f64> {
        self.element_floats(tag).and_then(|v| v.first().copied())
    }

    /// Exactly three values, as in ImagePositionPatient.
    fn element_vec3(&self, tag: Tag) -> Option<[f64; 3]> {
        match self.element_floats(tag)?.as_slice() {
            [x, y, z] => Some([*x, *y, *z]),
            _ => None,
        }
    }
}

impl ElementAccess for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim_end_matches(['\0', ' ']).to_string())
    }

    fn element_floats(&self, tag: Tag) -> Option<Vec<f64>> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_multi_float64().ok())
            .filter(|v| !v.is_empty() && v.iter().all(|x| x.is_finite()))
    }

    fn element_int(&self, tag: Tag) -> Option<i32> {
        self.element(tag).ok().and_then(|e| e.to_int::<i32>().ok())
    }

    fn has_element(&self, tag: Tag) -> bool {
        self.element(tag).is_ok()
    }
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        (**self).element_str(tag)
    }

    fn element_floats(&self, tag: Tag) -> Option<Vec<f64>> {
        (**self).element_floats(tag)
    }

    fn element_int(&self, tag: Tag) -> Option<i32> {
        (**self).element_int(tag)
    }

    fn has_element(&self, tag: Tag) -> bool {
        (**self).has_element(tag)
    }
}

/// Private attributes live in odd-numbered groups.
pub fn is_private(tag: Tag) -> bool {
    tag.group() % 2 == 1
}

/// Decimal String element (one or more values), each value kept within 16 characters.
pub fn ds_element(tag: Tag, values: &[f64]) -> InMemElement {
    let strings: Vec<String> = values.iter().map(|&v| format_ds(v)).collect();
    DataElement::new(tag, VR::DS, PrimitiveValue::Strs(strings.into()))
}

/// Integer String element.
pub fn is_element(tag: Tag, value: i64) -> InMemElement {
    DataElement::new(tag, VR::IS, PrimitiveValue::from(value.to_string()))
}

pub fn str_element(tag: Tag, vr: VR, value: &str) -> InMemElement {
    DataElement::new(tag, vr, PrimitiveValue::from(value))
}

pub fn multi_str_element(tag: Tag, vr: VR, values: &[&str]) -> InMemElement {
    let strings: Vec<String> = values.iter().map(|s| s.to_string()).collect();
    DataElement::new(tag, vr, PrimitiveValue::Strs(strings.into()))
}

pub fn us_element(tag: Tag, value: u16) -> InMemElement {
    DataElement::new(tag, VR::US, PrimitiveValue::from(value))
}

/// Formats a value for a DS element (at most 16 characters).
pub fn format_ds(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return "0".to_string();
    }
    let integer_digits = value.abs().log10().floor().max(0.0) as usize + 1;
    let sign = usize::from(value < 0.0);
    // 16 chars = sign + integer digits + '.' + decimals
    let decimals = 16usize.saturating_sub(sign + integer_digits + 1).min(6);
    let mut text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    if text == "-0" {
        text = "0".to_string();
    }
    if text.len() > 16 {
        text = format!("{:.6e}", value);
    }
    text
}
