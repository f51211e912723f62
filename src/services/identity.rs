// src/services/identity.rs

use std::collections::{hash_map::Entry, HashMap};

use crate::models::customer::{Customer, DuplicateGroup};

/// Chaves de identidade de um cliente, venha ele do banco, do lote ou de uma linha.
pub trait CustomerIdentity {
    fn name(&self) -> &str;
    fn license_number(&self) -> Option<&str>;
    fn gra_number(&self) -> Option<&str>;
}

impl CustomerIdentity for Customer {
    fn name(&self) -> &str {
        &self.name
    }
    fn license_number(&self) -> Option<&str> {
        self.license_number.as_deref()
    }
    fn gra_number(&self) -> Option<&str> {
        self.gra_number.as_deref()
    }
}

/// Chaves já normalizadas de uma linha da planilha.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityKeys {
    pub name: Option<String>,
    pub license_number: Option<String>,
    pub gra_number: Option<String>,
}

impl CustomerIdentity for IdentityKeys {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
    fn license_number(&self) -> Option<&str> {
        self.license_number.as_deref()
    }
    fn gra_number(&self) -> Option<&str> {
        self.gra_number.as_deref()
    }
}

#[derive(Debug, Clone, Copy)]
enum KeyKind {
    License,
    Gra,
}

impl KeyKind {
    fn of<T: CustomerIdentity + ?Sized>(self, who: &T) -> Option<&str> {
        match self {
            KeyKind::License => who.license_number(),
            KeyKind::Gra => who.gra_number(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            KeyKind::License => "License No.",
            KeyKind::Gra => "GRA No.",
        }
    }
}

fn same_name(a: &str, b: &str) -> bool {
    !a.is_empty() && a.trim().eq_ignore_ascii_case(b.trim())
}

/// Resolve a linha contra clientes conhecidos.
/// Prioridade: licença, depois GRA, depois nome (sem distinção de caixa). Só chave exata.
pub fn match_customer<'a, R, C>(row: &R, existing: &'a [C]) -> Option<&'a C>
where
    R: CustomerIdentity + ?Sized,
    C: CustomerIdentity,
{
    if let Some(license) = row.license_number() {
        if let Some(found) = existing.iter().find(|c| c.license_number() == Some(license)) {
            return Some(found);
        }
    }
    if let Some(gra) = row.gra_number() {
        if let Some(found) = existing.iter().find(|c| c.gra_number() == Some(gra)) {
            return Some(found);
        }
    }
    if row.name().is_empty() {
        return None;
    }
    existing.iter().find(|c| same_name(c.name(), row.name()))
}

/// Avisos (não bloqueantes) quando a licença/GRA da linha pertence a outro nome,
/// em outra linha do lote ou no cadastro.
pub fn find_conflicts<R, C>(
    row_index: usize,
    row: &R,
    batch: &[(usize, IdentityKeys)],
    existing: &[C],
) -> Vec<String>
where
    R: CustomerIdentity + ?Sized,
    C: CustomerIdentity,
{
    let mut warnings = Vec::new();
    if row.name().is_empty() {
        return warnings;
    }

    for kind in [KeyKind::License, KeyKind::Gra] {
        let Some(value) = kind.of(row) else { continue };

        for (other_index, other) in batch {
            if *other_index == row_index || kind.of(other) != Some(value) {
                continue;
            }
            if !other.name().is_empty() && !same_name(other.name(), row.name()) {
                warnings.push(format!(
                    "{} {value} is also used by '{}' in row {other_index}",
                    kind.label(),
                    other.name()
                ));
            }
        }

        for customer in existing {
            if kind.of(customer) == Some(value) && !same_name(customer.name(), row.name()) {
                warnings.push(format!(
                    "{} {value} already belongs to existing customer '{}'",
                    kind.label(),
                    customer.name()
                ));
            }
        }
    }

    warnings
}

/// Capitaliza cada palavra e colapsa espaços.
pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Telefone no formato local: 9 dígitos ganham o zero inicial, 10 dígitos passam direto.
/// Outros tamanhos são devolvidos como vieram.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        9 => Some(format!("0{digits}")),
        10 => Some(digits),
        _ => Some(trimmed.to_string()),
    }
}

/// Chave vazia vira None; o resto só perde espaços das pontas.
pub fn normalize_key(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

// --- Grupos de duplicados (para a ferramenta de merge) ---

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self { parent: (0..size).collect() }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb.max(ra)] = rb.min(ra);
        }
    }
}

/// Agrupa clientes que compartilham licença, GRA ou nome normalizado.
/// Cada componente conexo com mais de um membro é um grupo de merge; um cliente
/// aparece em no máximo um grupo.
pub fn duplicate_groups(customers: &[Customer]) -> Vec<DuplicateGroup> {
    let mut set = DisjointSet::new(customers.len());
    let mut buckets: HashMap<(u8, String), usize> = HashMap::new();

    for (i, customer) in customers.iter().enumerate() {
        let keys = [
            customer.license_number.as_deref().map(|k| (0u8, k.trim().to_uppercase())),
            customer.gra_number.as_deref().map(|k| (1u8, k.trim().to_uppercase())),
            Some((2u8, title_case(&customer.name).to_lowercase())),
        ];
        for key in keys.into_iter().flatten() {
            if key.1.is_empty() {
                continue;
            }
            match buckets.entry(key) {
                Entry::Occupied(first) => set.union(*first.get(), i),
                Entry::Vacant(slot) => {
                    slot.insert(i);
                }
            }
        }
    }

    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..customers.len() {
        let root = set.find(i);
        components.entry(root).or_default().push(i);
    }

    let mut groups: Vec<DuplicateGroup> = components
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|mut members| {
            members.sort_by_key(|&i| customers[i].id);
            DuplicateGroup {
                customer_ids: members.iter().map(|&i| customers[i].id).collect(),
                names: members.iter().map(|&i| customers[i].name.clone()).collect(),
            }
        })
        .collect();
    groups.sort_by_key(|g| g.customer_ids[0]);
    groups
}
