//! OCTGN deck list (.o8d) parsing and card resolution
//!
//! An .o8d file is XML of the form
//! `<deck><section name="Hero"><card qty="1" id="...">Aragorn</card></section></deck>`.

use crate::error::{ProxyError, Result};
use crate::metadata::Mapping;
use std::path::Path;

/// One card line of the deck list, before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckCard {
    pub id: String,
    pub quantity: u32,
    /// Card name as written in the deck file (informational only)
    pub name: String,
}

/// A deck card with its image asset resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckEntry {
    pub id: String,
    pub quantity: u32,
    pub asset_name: String,
}

impl DeckEntry {
    pub fn new(id: impl Into<String>, quantity: u32, asset_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            quantity,
            asset_name: asset_name.into(),
        }
    }
}

/// Read and parse a deck file
pub fn load_o8d(path: &Path) -> Result<Vec<DeckCard>> {
    let content = std::fs::read_to_string(path)?;
    parse_o8d(&content)
}

/// Parse deck XML into cards in document order, flattening sections
pub fn parse_o8d(xml: &str) -> Result<Vec<DeckCard>> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| ProxyError::Deck(format!("invalid deck XML: {}", e)))?;

    let root = doc.root_element();
    if !root.has_tag_name("deck") {
        return Err(ProxyError::Deck(format!(
            "expected <deck> root element, found <{}>",
            root.tag_name().name()
        )));
    }

    let mut cards = Vec::new();
    for section in root.children().filter(|n| n.has_tag_name("section")) {
        for card in section.children().filter(|n| n.has_tag_name("card")) {
            cards.push(parse_card(card)?);
        }
    }

    Ok(cards)
}

fn parse_card(node: roxmltree::Node) -> Result<DeckCard> {
    let id = node
        .attribute("id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProxyError::Deck("card without an id attribute".to_string()))?;

    let qty = node
        .attribute("qty")
        .ok_or_else(|| ProxyError::Deck(format!("card {} has no qty attribute", id)))?;
    let quantity: u32 = qty
        .trim()
        .parse()
        .map_err(|_| ProxyError::Deck(format!("card {} has invalid qty {:?}", id, qty)))?;
    if quantity == 0 {
        return Err(ProxyError::Deck(format!("card {} has qty 0", id)));
    }

    Ok(DeckCard {
        id: id.to_string(),
        quantity,
        name: node.text().unwrap_or_default().trim().to_string(),
    })
}

/// Attach asset names to deck cards. Fails on the first unknown identifier.
pub fn resolve_entries(cards: &[DeckCard], mapping: &Mapping) -> Result<Vec<DeckEntry>> {
    cards
        .iter()
        .map(|card| {
            let asset_name = mapping.get(&card.id).ok_or_else(|| {
                if !card.name.is_empty() {
                    log::error!("No image known for {} ({})", card.name, card.id);
                }
                ProxyError::UnresolvedIdentifier(card.id.clone())
            })?;
            Ok(DeckEntry::new(card.id.clone(), card.quantity, asset_name))
        })
        .collect()
}

/// Total number of physical copies in the deck
pub fn total_copies(deck: &[DeckEntry]) -> usize {
    deck.iter().map(|entry| entry.quantity as usize).sum()
}
