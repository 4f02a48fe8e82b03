//! Shopping-cart export: one summed line per distinct ingredient.

use std::collections::HashMap;

/// One ingredient row of a recipe in the cart.
#[derive(Debug, Clone, Copy)]
pub struct CartItem<'a> {
    pub ingredient_id: i64,
    pub name: &'a str,
    pub measurement_unit: &'a str,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub total: u64,
}

/// Groups rows by ingredient and sums their amounts.
///
/// Lines come out in the order each ingredient is first seen, so callers
/// control the report order through the order they feed recipes in.
pub fn aggregate<'a>(items: impl IntoIterator<Item = CartItem<'a>>) -> Vec<CartLine> {
    let mut positions: HashMap<i64, usize> = HashMap::new();
    let mut lines: Vec<CartLine> = Vec::new();

    for item in items {
        match positions.get(&item.ingredient_id) {
            Some(&index) => lines[index].total += u64::from(item.amount),
            None => {
                positions.insert(item.ingredient_id, lines.len());
                lines.push(CartLine {
                    name: item.name.to_string(),
                    measurement_unit: item.measurement_unit.to_string(),
                    total: u64::from(item.amount),
                });
            }
        }
    }

    lines
}

/// Renders lines as `"{name}: {total} {unit}"`, newline separated.
pub fn render(lines: &[CartLine]) -> String {
    lines
        .iter()
        .map(|line| format!("{}: {} {}", line.name, line.total, line.measurement_unit))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn attachment_name(username: &str) -> String {
    format!("shopping_cart_{}.txt", username)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(ingredient_id: i64, name: &'static str, unit: &'static str, amount: u32) -> CartItem<'static> {
        CartItem {
            ingredient_id,
            name,
            measurement_unit: unit,
            amount,
        }
    }

    #[test]
    fn sums_the_same_ingredient_across_recipes() {
        let lines = aggregate([
            item(1, "Flour", "g", 100),
            item(2, "Egg", "pcs", 2),
            item(1, "Flour", "g", 50),
        ]);

        assert_eq!(render(&lines), "Flour: 150 g\nEgg: 2 pcs");
    }

    #[test]
    fn keeps_first_encounter_order() {
        let lines = aggregate([
            item(3, "Sugar", "g", 10),
            item(1, "Apple", "pcs", 1),
            item(3, "Sugar", "g", 5),
        ]);
        let names: Vec<&str> = lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Sugar", "Apple"]);
    }

    #[test]
    fn groups_by_identity_not_name() {
        let lines = aggregate([item(1, "Salt", "g", 5), item(2, "Salt", "tsp", 1)]);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn empty_cart_gives_empty_report() {
        assert_eq!(render(&aggregate(std::iter::empty())), "");
    }

    #[test]
    fn totals_do_not_overflow_u32() {
        let lines = aggregate((0..200_000).map(|_| item(1, "Water", "ml", 32_000)));
        assert_eq!(lines[0].total, 200_000 * 32_000);
    }
}
