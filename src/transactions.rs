//! Bank statement transaction extraction
//!
//! Raw page text is cut into blocks, one per transaction, at lines that open
//! with a date glued to a letter. Each block is then tokenized into date,
//! amount and text tokens and mapped onto a [`Transaction`].
//!
//! The patterns live in [`StatementFormat`], so another statement layout is
//! a new format value rather than new parsing code.

use crate::PdfError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Field names, in column order
pub const HEADERS: [&str; 5] = ["Date", "Description", "Amount", "Fees", "Balance"];

/// One parsed statement line. Amounts keep their original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "Fees")]
    pub fees: String,
    #[serde(rename = "Balance")]
    pub balance: String,
}

impl Transaction {
    /// Values in [`HEADERS`] order
    pub fn fields(&self) -> [&str; 5] {
        [
            &self.date,
            &self.description,
            &self.amount,
            &self.fees,
            &self.balance,
        ]
    }
}

/// Transactions plus the header names for tabular output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedData {
    pub transactions: Vec<Transaction>,
    pub headers: Vec<String>,
}

/// Why a block did not become a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRejection {
    MissingDate,
    TooFewAmounts(usize),
}

impl std::fmt::Display for BlockRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockRejection::MissingDate => write!(f, "no leading date"),
            BlockRejection::TooFewAmounts(n) => write!(f, "{} amount(s), need at least 2", n),
        }
    }
}

/// A classified span of block text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Date(&'a str),
    Amount(&'a str),
    Text(&'a str),
}

/// Patterns describing one statement layout
#[derive(Debug, Clone)]
pub struct StatementFormat {
    /// Date token anchored at the start of a block
    leading_date: Regex,
    /// Line start where a new block begins
    block_start: Regex,
    /// Money amount anywhere in a block
    amount: Regex,
}

/// `DD/MM/YYYY` or `YYYY-MM-DD`
const DATE_PATTERN: &str = r"\d{2}/\d{2}/\d{4}|\d{4}-\d{2}-\d{2}";

impl Default for StatementFormat {
    fn default() -> Self {
        Self::with_currency("R")
    }
}

impl StatementFormat {
    /// Format with the given currency marker in front of amounts
    pub fn with_currency(currency: &str) -> Self {
        // A letter marker must not be the tail of a word like "TRANSFER"
        let boundary = match currency.chars().next() {
            Some(c) if c.is_alphanumeric() || c == '_' => r"\b",
            _ => "",
        };
        let currency = regex::escape(currency);
        let amount =
            format!(r"-?(?:{boundary}{currency}\s?)?\d{{1,3}}(?: \d{{3}})*\.\d{{2}}");

        Self::from_patterns(DATE_PATTERN, &amount)
            .expect("built-in statement patterns are valid")
    }

    /// Format from custom date and amount patterns
    pub fn from_patterns(date: &str, amount: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            leading_date: Regex::new(&format!(r"^(?:{date})"))?,
            // A date inside a description is not followed by a letter
            block_start: Regex::new(&format!(r"\n(?:{date})[A-Za-z]"))?,
            amount: Regex::new(amount)?,
        })
    }

    /// Leading date token of a block, if any
    pub fn leading_date<'a>(&self, block: &'a str) -> Option<&'a str> {
        self.leading_date.find(block).map(|m| m.as_str())
    }

    /// All amount tokens in order of appearance
    pub fn amounts<'a>(&self, block: &'a str) -> Vec<&'a str> {
        self.amount.find_iter(block).map(|m| m.as_str()).collect()
    }

    /// Split a block into date, amount and text tokens.
    ///
    /// Amounts are matched over the whole block, so an amount may overlap
    /// the tail of the leading date token.
    pub fn tokenize<'a>(&self, block: &'a str) -> Vec<Token<'a>> {
        let mut tokens = Vec::new();
        let mut pos = 0;

        if let Some(date) = self.leading_date(block) {
            tokens.push(Token::Date(date));
            pos = date.len();
        }

        for m in self.amount.find_iter(block) {
            if m.start() > pos {
                tokens.push(Token::Text(&block[pos..m.start()]));
            }
            tokens.push(Token::Amount(m.as_str()));
            pos = pos.max(m.end());
        }

        if pos < block.len() {
            tokens.push(Token::Text(&block[pos..]));
        }

        tokens
    }

    /// Cut raw text into trimmed, non-empty transaction blocks
    pub fn segment<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut starts: Vec<usize> = vec![0];
        starts.extend(self.block_start.find_iter(text).map(|m| m.start()));
        starts.push(text.len());

        starts
            .windows(2)
            .map(|w| text[w[0]..w[1]].trim())
            .filter(|block| !block.is_empty())
            .collect()
    }
}

/// Parse one block, reporting why it was rejected
pub fn try_parse_block(block: &str, format: &StatementFormat) -> Result<Transaction, BlockRejection> {
    let tokens = format.tokenize(block);

    let date = match tokens.first() {
        Some(Token::Date(date)) => *date,
        _ => return Err(BlockRejection::MissingDate),
    };

    let amounts: Vec<&str> = tokens
        .iter()
        .filter_map(|token| match token {
            Token::Amount(amount) => Some(*amount),
            _ => None,
        })
        .collect();

    if amounts.len() < 2 {
        return Err(BlockRejection::TooFewAmounts(amounts.len()));
    }

    // The rightmost amount is the running balance
    let balance = amounts[amounts.len() - 1];

    let mut others = amounts.iter().copied().filter(|amount| *amount != balance);
    let (amount, fees) = match others.next() {
        Some(amount) => (amount, others.next().unwrap_or_default()),
        None => (amounts[0], ""),
    };

    Ok(Transaction {
        date: date.to_string(),
        description: clean_description(&block[date.len()..], &amounts),
        amount: amount.to_string(),
        fees: fees.to_string(),
        balance: balance.to_string(),
    })
}

/// Parse one block, logging and discarding rejects
pub fn parse_transaction(block: &str, format: &StatementFormat) -> Option<Transaction> {
    match try_parse_block(block, format) {
        Ok(transaction) => Some(transaction),
        Err(reason) => {
            log::debug!("rejected block ({}): {:?}", reason, block);
            None
        }
    }
}

/// Remove every occurrence of each amount and normalize whitespace
fn clean_description(rest: &str, amounts: &[&str]) -> String {
    let mut description = rest.trim().to_string();

    for amount in amounts {
        description = description.replace(amount, "");
    }

    description.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Segment raw statement text and parse every block
pub fn parse_transactions(text: &str, format: &StatementFormat) -> Result<ExtractedData, PdfError> {
    let blocks = format.segment(text);
    let transactions: Vec<Transaction> = blocks
        .iter()
        .filter_map(|block| parse_transaction(block, format))
        .collect();

    log::debug!(
        "{} of {} blocks parsed as transactions",
        transactions.len(),
        blocks.len()
    );

    if transactions.is_empty() {
        return Err(PdfError::NoTransactions);
    }

    Ok(ExtractedData {
        transactions,
        headers: HEADERS.iter().map(|h| h.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(block: &str) -> Option<Transaction> {
        parse_transaction(block, &StatementFormat::default())
    }

    #[test]
    fn test_parse_purchase_with_balance() {
        let txn = parse("01/02/2024 GROCERY STORE R1 234.56 R 50 000.00").unwrap();
        assert_eq!(txn.date, "01/02/2024");
        assert_eq!(txn.description, "GROCERY STORE");
        assert_eq!(txn.amount, "R1 234.56");
        assert_eq!(txn.fees, "");
        assert_eq!(txn.balance, "R 50 000.00");
    }

    #[test]
    fn test_single_amount_is_rejected() {
        assert_eq!(parse("01/02/2024 REFUND R10.00"), None);
        assert_eq!(
            try_parse_block("01/02/2024 REFUND R10.00", &StatementFormat::default()),
            Err(BlockRejection::TooFewAmounts(1))
        );
    }

    #[test]
    fn test_missing_date_is_rejected() {
        assert_eq!(
            try_parse_block("GROCERY 10.00 20.00", &StatementFormat::default()),
            Err(BlockRejection::MissingDate)
        );
    }

    #[test]
    fn test_amount_fee_and_balance() {
        let txn = parse("2024-03-15 Transfer -500.00 -5.50 1 200.00").unwrap();
        assert_eq!(txn.date, "2024-03-15");
        assert_eq!(txn.amount, "-500.00");
        assert_eq!(txn.fees, "-5.50");
        assert_eq!(txn.balance, "1 200.00");
        assert_eq!(txn.description, "Transfer");
    }

    #[test]
    fn test_amount_equal_to_balance_falls_back_to_first() {
        let txn = parse("01/02/2024 Deposit 100.00 100.00").unwrap();
        assert_eq!(txn.amount, "100.00");
        assert_eq!(txn.balance, "100.00");
        assert_eq!(txn.fees, "");
        assert_eq!(txn.description, "Deposit");
    }

    #[test]
    fn test_empty_description_allowed() {
        let txn = parse("01/02/2024 10.00 20.00").unwrap();
        assert_eq!(txn.description, "");
    }

    #[test]
    fn test_description_is_stable() {
        let txn = parse("01/02/2024   Card   purchase\n  Shop 12.00 30.00").unwrap();
        assert_eq!(txn.description, "Card purchase Shop");

        let again = parse(&format!("01/02/2024 {} 12.00 30.00", txn.description)).unwrap();
        assert_eq!(again.description, txn.description);
    }

    #[test]
    fn test_tokenize() {
        let format = StatementFormat::default();
        let tokens = format.tokenize("01/02/2024 Fee 5.00 95.00");
        assert_eq!(
            tokens,
            vec![
                Token::Date("01/02/2024"),
                Token::Text(" Fee "),
                Token::Amount("5.00"),
                Token::Text(" "),
                Token::Amount("95.00"),
            ]
        );
    }

    #[test]
    fn test_amount_overlapping_date_is_kept() {
        let format = StatementFormat::default();
        let block = "01/02/2024.50 Shop 10.00";
        assert_eq!(
            format.tokenize(block),
            vec![
                Token::Date("01/02/2024"),
                Token::Amount("024.50"),
                Token::Text(" Shop "),
                Token::Amount("10.00"),
            ]
        );

        let data = parse_transactions(block, &format).unwrap();
        let txn = &data.transactions[0];
        assert_eq!(txn.date, "01/02/2024");
        assert_eq!(txn.amount, "024.50");
        assert_eq!(txn.fees, "");
        assert_eq!(txn.balance, "10.00");
        assert_eq!(txn.description, ".50 Shop");
    }

    #[test]
    fn test_currency_suffix_of_word_is_not_a_marker() {
        let format = StatementFormat::default();
        assert_eq!(
            format.amounts("TRANSFER 100.00 R 2 500.00 -R10.00"),
            vec!["100.00", "R 2 500.00", "-R10.00"]
        );
    }

    #[test]
    fn test_segment_on_date_followed_by_letter() {
        let format = StatementFormat::default();
        let text = "Header line\n01/02/2024Shop 10.00 90.00\n2024-02-03Salary 1 000.00 1 090.00";
        let blocks = format.segment(text);
        assert_eq!(
            blocks,
            vec![
                "Header line",
                "01/02/2024Shop 10.00 90.00",
                "2024-02-03Salary 1 000.00 1 090.00",
            ]
        );
    }

    #[test]
    fn test_segment_keeps_dates_inside_descriptions() {
        let format = StatementFormat::default();
        let text = "2024-03-15X OPENING BALANCE 100.00\n2024-03-16 200.00 300.00";
        let blocks = format.segment(text);
        assert_eq!(blocks.len(), 1);

        let txn = parse_transaction(blocks[0], &format).unwrap();
        assert_eq!(txn.date, "2024-03-15");
        assert_eq!(txn.balance, "300.00");
    }

    #[test]
    fn test_parse_transactions_drops_bad_blocks() {
        let text = "Statement\n01/02/2024Shop 10.00 90.00\n02/02/2024Note only\n03/02/2024Fee 1.00 89.00";
        let data = parse_transactions(text, &StatementFormat::default()).unwrap();
        assert_eq!(data.transactions.len(), 2);
        assert_eq!(data.headers, HEADERS);
        assert_eq!(data.transactions[1].description, "Fee");
    }

    #[test]
    fn test_parse_transactions_fails_without_records() {
        let result = parse_transactions("nothing here", &StatementFormat::default());
        assert!(matches!(result, Err(PdfError::NoTransactions)));
    }

    #[test]
    fn test_alternate_currency() {
        let format = StatementFormat::with_currency("$");
        let txn = parse_transaction("01/02/2024 Coffee $4.50 $95.50", &format).unwrap();
        assert_eq!(txn.amount, "$4.50");
        assert_eq!(txn.balance, "$95.50");
        assert_eq!(txn.description, "Coffee");
    }

    #[test]
    fn test_serialized_headers() {
        let txn = parse("01/02/2024 Shop 1.00 2.00").unwrap();
        let json = serde_json::to_string(&txn).unwrap();
        assert!(json.starts_with("{\"Date\":\"01/02/2024\",\"Description\":\"Shop\""));
    }
}
