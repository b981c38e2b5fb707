// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in financial knowledge corpus.
//!
//! A starter set of Taiwanese stock-market entries so a fresh deployment can
//! answer common questions before any caller-supplied knowledge arrives.
//! Keywords are curated per entry rather than derived.

use std::collections::BTreeSet;

use crate::store::DocumentInput;

fn entry(
    id: &str,
    title: &str,
    content: &str,
    category: &str,
    tags: &[&str],
    keywords: &[&str],
) -> DocumentInput {
    DocumentInput {
        id: Some(id.to_string()),
        title: title.to_string(),
        content: content.to_string(),
        category: category.to_string(),
        tags: tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        keywords: Some(keywords.iter().map(|s| s.to_string()).collect()),
        source: "built-in".to_string(),
        timestamp: None,
    }
}

/// The default knowledge entries, in a stable order.
pub fn default_knowledge() -> Vec<DocumentInput> {
    vec![
        entry(
            "stock_basic_001",
            "什麼是股票",
            "股票是公司發行的有價證券，代表股東對公司的所有權份額。持有股票意味著擁有公司的一部分，可以享受公司盈利分配（股息）和資本增值的權利。股票可以在證券交易所買賣，價格會根據市場供需關係波動。",
            "股票基礎",
            &["股票", "投資", "證券"],
            &["股票", "公司", "股東", "所有權", "股息", "資本增值", "證券交易所", "買賣", "價格", "市場"],
        ),
        entry(
            "stock_basic_002",
            "股票代碼系統",
            "台灣股票代碼是4位數字，例如台積電是2330。代碼的第一位數字通常代表產業類別：1開頭是水泥、食品等傳統產業，2開頭是塑膠、紡織、電機、化學等，3開頭是鋼鐵、橡膠等，4開頭是機械、電器電纜等，5開頭是電子、資訊等高科技產業，6開頭是營建、運輸等，8開頭是金融保險業，9開頭是貿易百貨業。",
            "股票基礎",
            &["股票代碼", "分類", "台股"],
            &["股票代碼", "台灣", "4位數字", "台積電", "2330", "產業類別", "傳統產業", "高科技", "電子", "金融"],
        ),
        entry(
            "term_001",
            "本益比 (P/E Ratio)",
            "本益比是股價與每股盈餘的比值，計算公式為：本益比 = 股價 ÷ 每股盈餘(EPS)。本益比反映投資人願意為每元盈餘支付多少錢，是評估股票是否便宜的重要指標。一般來說，本益比越低表示股票相對便宜，但也要考慮公司的成長性和產業特性。",
            "財經術語",
            &["本益比", "PE", "估值", "投資分析"],
            &["本益比", "PE", "P/E", "股價", "每股盈餘", "EPS", "計算公式", "投資人", "評估", "便宜", "成長性"],
        ),
        entry(
            "term_002",
            "股價淨值比 (P/B Ratio)",
            "股價淨值比是股價與每股淨值的比值，計算公式為：股價淨值比 = 股價 ÷ 每股淨值。這個比率反映市場對公司資產的評價，比值越低表示股票相對便宜。通常用於評估資產密集型企業，如銀行、保險、營建等行業。",
            "財經術語",
            &["股價淨值比", "PB", "淨值", "資產評價"],
            &["股價淨值比", "PB", "P/B", "股價", "每股淨值", "比值", "市場", "資產", "評價", "銀行", "保險", "營建"],
        ),
        entry(
            "term_003",
            "股息殖利率",
            "股息殖利率是年度股息與股價的比值，計算公式為：股息殖利率 = 年度股息 ÷ 股價 × 100%。這個指標反映投資股票的現金收益率，類似銀行存款利率。高股息殖利率的股票通常受到追求穩定收益的投資人青睞。",
            "財經術語",
            &["股息殖利率", "股息", "現金收益", "被動收入"],
            &["股息殖利率", "年度股息", "股價", "現金收益率", "銀行存款", "利率", "高股息", "穩定收益", "投資人"],
        ),
        entry(
            "taiwan_001",
            "台積電 (2330)",
            "台積電是全球最大的晶圓代工廠，成立於1987年，總部位於新竹科學園區。公司主要業務為積體電路製造服務，客戶包括蘋果、NVIDIA、AMD等知名科技公司。台積電在先進製程技術方面領先全球，是台股市值最大的公司，也是台灣最重要的科技企業之一。",
            "台股個股",
            &["台積電", "2330", "半導體", "晶圓代工"],
            &["台積電", "2330", "晶圓代工", "1987", "新竹科學園區", "積體電路", "蘋果", "NVIDIA", "AMD", "先進製程", "台股", "市值", "科技企業"],
        ),
        entry(
            "taiwan_002",
            "鴻海 (2317)",
            "鴻海精密工業股份有限公司是全球最大的電子製造服務商，成立於1974年。公司主要從事電子產品代工製造，包括智慧型手機、電腦、遊戲機等。鴻海是蘋果iPhone的主要組裝廠商，在中國大陸設有多個生產基地。近年來積極轉型，投入電動車、半導體等新興產業。",
            "台股個股",
            &["鴻海", "2317", "電子製造", "代工"],
            &["鴻海", "2317", "電子製造", "1974", "代工製造", "智慧型手機", "電腦", "遊戲機", "蘋果", "iPhone", "中國大陸", "電動車", "半導體"],
        ),
        entry(
            "taiwan_003",
            "元大台灣50 (0050)",
            "元大台灣50 ETF追蹤台灣50指數，投資台灣市值最大的50家上市公司。這是台灣第一檔ETF，成立於2003年，管理費用低廉，適合長期投資。由於分散投資於台股龍頭企業，風險相對較低，是許多投資新手的首選標的。",
            "台股ETF",
            &["0050", "ETF", "台灣50", "被動投資"],
            &["元大台灣50", "0050", "ETF", "台灣50指數", "50家", "上市公司", "2003", "管理費用", "長期投資", "分散投資", "龍頭企業", "風險", "新手"],
        ),
        entry(
            "strategy_001",
            "價值投資",
            "價值投資是尋找被市場低估的股票進行長期投資的策略。投資者通過分析公司的基本面，如財務狀況、盈利能力、成長前景等，找出內在價值高於市場價格的股票。著名的價值投資者包括巴菲特、葛拉漢等。關鍵指標包括本益比、股價淨值比、股息殖利率等。",
            "投資策略",
            &["價值投資", "巴菲特", "基本面分析", "長期投資"],
            &["價值投資", "市場低估", "長期投資", "基本面", "財務狀況", "盈利能力", "成長前景", "內在價值", "市場價格", "巴菲特", "葛拉漢", "本益比", "股價淨值比", "股息殖利率"],
        ),
        entry(
            "strategy_002",
            "定期定額投資",
            "定期定額投資是每月固定投資一定金額購買股票或基金的策略。這種方式可以分散投資時點，降低市場波動的影響，適合長期累積財富。當股價下跌時買到更多股數，股價上漲時買到較少股數，長期下來可以平均成本。特別適合投資ETF或績優股。",
            "投資策略",
            &["定期定額", "平均成本", "長期投資", "ETF"],
            &["定期定額", "每月", "固定投資", "股票", "基金", "分散投資", "市場波動", "長期累積", "財富", "股價下跌", "股價上漲", "平均成本", "ETF", "績優股"],
        ),
        entry(
            "technical_001",
            "移動平均線",
            "移動平均線是技術分析中最常用的指標之一，計算一定期間內股價的平均值。常用的有5日、10日、20日、60日移動平均線。當股價在移動平均線之上時，通常表示上升趨勢；反之則表示下降趨勢。黃金交叉（短期均線向上突破長期均線）被視為買進訊號，死亡交叉則為賣出訊號。",
            "技術分析",
            &["移動平均線", "MA", "黃金交叉", "死亡交叉"],
            &["移動平均線", "技術分析", "股價", "平均值", "5日", "10日", "20日", "60日", "上升趨勢", "下降趨勢", "黃金交叉", "死亡交叉", "買進訊號", "賣出訊號"],
        ),
        entry(
            "technical_002",
            "RSI相對強弱指標",
            "RSI是衡量股價漲跌動能的震盪指標，數值介於0-100之間。當RSI超過70時，表示股票可能超買，有回檔壓力；當RSI低於30時，表示股票可能超賣，有反彈機會。RSI也可以用來判斷背離現象，當股價創新高但RSI未創新高時，可能是賣出訊號。",
            "技術分析",
            &["RSI", "相對強弱指標", "超買", "超賣"],
            &["RSI", "相對強弱指標", "股價", "漲跌動能", "震盪指標", "0-100", "超買", "70", "回檔壓力", "超賣", "30", "反彈機會", "背離現象", "創新高", "賣出訊號"],
        ),
    ]
}
